//! User-facing messages for the family screens.

pub const CREATE_SUCCESS: &str = "Family created successfully.";
pub const UPDATE_SUCCESS: &str = "Family updated successfully.";
pub const DELETE_SUCCESS: &str = "Family deleted successfully.";
pub const DELETE_FAILED: &str = "Error encountered while deleting family.";
pub const LAST_DELETE_ERROR: &str = "At least one family is required.";
pub const ATTRIBUTE_PRODUCT_ERROR: &str = "Attribute family is used in product.";

pub const MASS_DELETE_SUCCESS: &str = "Selected data successfully deleted.";
pub const MASS_PARTIAL_ACTION: &str =
    "Some of the selected attribute families could not be deleted.";
pub const MASS_METHOD_ERROR: &str = "This method is not allowed.";

pub const CODE_REQUIRED: &str = "The code field is required.";
pub const CODE_TAKEN: &str = "The code has already been taken.";
pub const CODE_FORMAT: &str =
    "The code must start with a letter and contain only letters, numbers and underscores.";
pub const NAME_REQUIRED: &str = "The name field is required.";
