use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use shared::{
    domain::AttributeFamilyId,
    error::ApiError,
    protocol::{AttributeFamilyInput, AttributeGroupInput},
};
use storage::{FamilyRecord, Storage};

use crate::{internal, messages};

/// Letter first, then at least one letter, digit or underscore.
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+[a-zA-Z0-9_]+$").expect("code pattern"));

#[derive(Debug, Clone)]
pub struct ValidatedFamily {
    pub code: String,
    pub name: String,
    pub attribute_groups: Vec<AttributeGroupInput>,
}

impl ValidatedFamily {
    pub fn record(&self) -> FamilyRecord<'_> {
        FamilyRecord {
            code: &self.code,
            name: &self.name,
            attribute_groups: &self.attribute_groups,
        }
    }
}

pub fn is_valid_code(code: &str) -> bool {
    CODE_RE.is_match(code)
}

/// Checks `code` (required, unique, format) and `name` (required).
/// `ignore_id` excludes the family being updated from the uniqueness check.
pub async fn validate_family(
    storage: &Storage,
    input: AttributeFamilyInput,
    ignore_id: Option<AttributeFamilyId>,
) -> Result<ValidatedFamily, ApiError> {
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let code = trimmed(input.code);
    let name = trimmed(input.name);

    match code.as_deref() {
        None => push(&mut errors, "code", messages::CODE_REQUIRED),
        Some(code) => {
            if storage
                .family_code_taken(code, ignore_id)
                .await
                .map_err(internal)?
            {
                push(&mut errors, "code", messages::CODE_TAKEN);
            }
            if !is_valid_code(code) {
                push(&mut errors, "code", messages::CODE_FORMAT);
            }
        }
    }

    if name.is_none() {
        push(&mut errors, "name", messages::NAME_REQUIRED);
    }

    match (code, name) {
        (Some(code), Some(name)) if errors.is_empty() => Ok(ValidatedFamily {
            code,
            name,
            attribute_groups: input.attribute_groups,
        }),
        _ => Err(ApiError::validation(errors)),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn push(errors: &mut BTreeMap<String, Vec<String>>, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_format_requires_leading_letter_and_two_chars() {
        assert!(is_valid_code("shoes"));
        assert!(is_valid_code("Shoes_2024"));
        assert!(!is_valid_code("s"));
        assert!(!is_valid_code("9shoes"));
        assert!(!is_valid_code("_shoes"));
        assert!(!is_valid_code("running-shoes"));
        assert!(!is_valid_code("shoes!"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        assert_eq!(trimmed(Some("   ".to_string())), None);
        assert_eq!(trimmed(Some(" shoes ".to_string())).as_deref(), Some("shoes"));
        assert_eq!(trimmed(None), None);
    }
}
