pub const FAMILIES_INDEX: &str = "admin.catalog.families.index";
pub const FAMILIES_EDIT: &str = "admin.catalog.families.edit";
pub const FAMILIES_DELETE: &str = "admin.catalog.families.delete";
pub const FAMILIES_MASS_DELETE: &str = "admin.catalog.families.mass_delete";

pub fn families_index_route() -> &'static str {
    "/admin/catalog/families"
}

pub fn families_create_route() -> &'static str {
    "/admin/catalog/families/create"
}

pub fn families_edit_route() -> &'static str {
    "/admin/catalog/families/edit/:id"
}

pub fn families_mass_delete_route() -> &'static str {
    "/admin/catalog/families/mass-delete"
}

/// Resolves a named route to its path. Edit/delete share the `:id` template.
pub fn route_path(name: &str) -> Option<&'static str> {
    match name {
        FAMILIES_INDEX => Some(families_index_route()),
        FAMILIES_EDIT | FAMILIES_DELETE => Some(families_edit_route()),
        FAMILIES_MASS_DELETE => Some(families_mass_delete_route()),
        _ => None,
    }
}
