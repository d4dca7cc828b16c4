use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(AttributeFamilyId);
id_newtype!(AttributeGroupId);
id_newtype!(AttributeId);
id_newtype!(ProductId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Text,
    Textarea,
    Price,
    Boolean,
    Select,
    Multiselect,
    Datetime,
    Date,
    Image,
    File,
    Checkbox,
}

impl AttributeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Price => "price",
            Self::Boolean => "boolean",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Datetime => "datetime",
            Self::Date => "date",
            Self::Image => "image",
            Self::File => "file",
            Self::Checkbox => "checkbox",
        }
    }

    /// Unknown stored values read back as plain text.
    pub fn from_db(value: &str) -> Self {
        match value {
            "textarea" => Self::Textarea,
            "price" => Self::Price,
            "boolean" => Self::Boolean,
            "select" => Self::Select,
            "multiselect" => Self::Multiselect,
            "datetime" => Self::Datetime,
            "date" => Self::Date,
            "image" => Self::Image,
            "file" => Self::File,
            "checkbox" => Self::Checkbox,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub code: String,
    pub admin_name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    pub is_user_defined: bool,
}

/// An attribute as placed inside a group, with its position in that group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAttribute {
    #[serde(flatten)]
    pub attribute: Attribute,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeGroup {
    pub id: AttributeGroupId,
    pub name: String,
    pub column: i64,
    pub position: i64,
    pub custom_attributes: Vec<GroupAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeFamily {
    pub id: AttributeFamilyId,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A family loaded together with its groups and their attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeFamilyDetail {
    #[serde(flatten)]
    pub family: AttributeFamily,
    pub attribute_groups: Vec<AttributeGroup>,
}
