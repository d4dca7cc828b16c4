use serde::{Deserialize, Serialize};

use crate::domain::{Attribute, AttributeFamilyDetail, AttributeFamilyId, AttributeId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeFamilyInput {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attribute_groups: Vec<AttributeGroupInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeGroupInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default)]
    pub custom_attributes: Vec<GroupAttributeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAttributeInput {
    pub id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MassDestroyRequest {
    #[serde(default)]
    pub indexes: String,
    /// Form-style method override, e.g. `"delete"` on a POST.
    #[serde(default, rename = "_method", skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Where the caller should go next, with the one-time message for that page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum RedirectTarget {
    Route(String),
    Back,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redirect {
    pub to: RedirectTarget,
    pub flash: Flash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyFormData {
    #[serde(rename = "attributeFamily")]
    pub attribute_family: AttributeFamilyDetail,
    #[serde(rename = "customAttributes")]
    pub custom_attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView<T> {
    pub view: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyRow {
    pub id: AttributeFamilyId,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridColumn {
    pub index: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub searchable: bool,
    pub sortable: bool,
    pub filterable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridAction {
    pub index: String,
    pub title: String,
    pub method: String,
    pub route: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
    pub sort: String,
    pub order: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataGridPayload {
    pub id: String,
    pub columns: Vec<GridColumn>,
    pub actions: Vec<GridAction>,
    pub mass_actions: Vec<GridAction>,
    pub records: Vec<FamilyRow>,
    pub meta: GridMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CatalogEvent {
    AttributeFamilyCreateBefore,
    AttributeFamilyCreateAfter { family: AttributeFamilyDetail },
    AttributeFamilyUpdateBefore { id: AttributeFamilyId },
    AttributeFamilyUpdateAfter { family: AttributeFamilyDetail },
    AttributeFamilyDeleteBefore { id: AttributeFamilyId },
    AttributeFamilyDeleteAfter { id: AttributeFamilyId },
}

impl CatalogEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AttributeFamilyCreateBefore => "catalog.attribute_family.create.before",
            Self::AttributeFamilyCreateAfter { .. } => "catalog.attribute_family.create.after",
            Self::AttributeFamilyUpdateBefore { .. } => "catalog.attribute_family.update.before",
            Self::AttributeFamilyUpdateAfter { .. } => "catalog.attribute_family.update.after",
            Self::AttributeFamilyDeleteBefore { .. } => "catalog.attribute_family.delete.before",
            Self::AttributeFamilyDeleteAfter { .. } => "catalog.attribute_family.delete.after",
        }
    }
}
