//! Field validation and diff suppression

use super::error::{ProviderError, Result};
use crate::datahub::models::RecordSchema;
use serde::Deserialize;
use serde_json::Value;

/// Check applied to a configured field value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    IntRange { min: i64, max: i64 },
    StringLength { min: usize, max: usize },
    OneOf { values: Vec<String> },
    Json,
    ProjectName,
    TopicName,
}

impl Validator {
    pub fn check(&self, field: &str, value: &Value) -> Result<()> {
        match self {
            Self::IntRange { min, max } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| ProviderError::validation(field, "expected an integer"))?;
                validate_integer_in_range(field, n, *min, *max)
            }
            Self::StringLength { min, max } => {
                validate_string_length_in_range(field, expect_str(field, value)?, *min, *max)
            }
            Self::OneOf { values } => {
                validate_allowed_string_value(field, expect_str(field, value)?, values)
            }
            Self::Json => validate_json_string(field, expect_str(field, value)?),
            Self::ProjectName => validate_datahub_name(field, expect_str(field, value)?, 3, 32),
            Self::TopicName => validate_datahub_name(field, expect_str(field, value)?, 1, 128),
        }
    }
}

fn expect_str<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ProviderError::validation(field, "expected a string"))
}

pub fn validate_integer_in_range(field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(ProviderError::validation(
            field,
            format!("expected to be in the range ({} - {}), got {}", min, max, value),
        ));
    }
    Ok(())
}

pub fn validate_string_length_in_range(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ProviderError::validation(
            field,
            format!("length must be between {} and {} characters, got {}", min, max, len),
        ));
    }
    Ok(())
}

pub fn validate_allowed_string_value(field: &str, value: &str, allowed: &[String]) -> Result<()> {
    if !allowed.iter().any(|a| a == value) {
        return Err(ProviderError::validation(
            field,
            format!("must be one of {:?}, got '{}'", allowed, value),
        ));
    }
    Ok(())
}

/// Empty strings are accepted: an unset optional JSON field
pub fn validate_json_string(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<Value>(value)
        .map(drop)
        .map_err(|e| ProviderError::validation(field, format!("invalid JSON: {}", e)))
}

/// Datahub names start with a letter, followed by letters, digits or `_`
pub fn validate_datahub_name(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    validate_string_length_in_range(field, value, min, max)?;

    let mut chars = value.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(ProviderError::validation(field, "must start with a letter"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ProviderError::validation(
            field,
            "may only contain letters, digits and '_'",
        ));
    }
    Ok(())
}

/// When a difference between stored and configured values is not a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSuppress {
    CaseInsensitive,
    JsonEquivalent,
    RecordSchema,
}

impl DiffSuppress {
    pub fn suppress(&self, old: &str, new: &str) -> bool {
        match self {
            Self::CaseInsensitive => old.to_lowercase() == new.to_lowercase(),
            Self::JsonEquivalent => json_equivalent(old, new),
            Self::RecordSchema => record_schema_equivalent(old, new),
        }
    }
}

/// Same JSON document regardless of whitespace and object key order
///
/// Array order still matters; for record schemas it is the column order.
pub fn json_equivalent(old: &str, new: &str) -> bool {
    if old.trim().is_empty() || new.trim().is_empty() {
        return old.trim().is_empty() && new.trim().is_empty();
    }
    match (
        serde_json::from_str::<Value>(old),
        serde_json::from_str::<Value>(new),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => old == new,
    }
}

/// Same record schema once both sides are normalized
///
/// Stored schemas come back from Datahub in compact form without defaulted
/// keys such as `"notnull": false`, so raw JSON equality is too strict.
/// Documents that are not valid schemas fall back to [`json_equivalent`].
pub fn record_schema_equivalent(old: &str, new: &str) -> bool {
    match (RecordSchema::from_json(old), RecordSchema::from_json(new)) {
        (Ok(a), Ok(b)) => a == b,
        _ => json_equivalent(old, new),
    }
}
