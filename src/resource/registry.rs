//! Resource Registry - Load resource schemas from JSON
//!
//! This module loads the Datahub resource schemas from embedded JSON files
//! and provides lookup functions for the rest of the crate.

use super::error::{ProviderError, Result};
use super::validate::{DiffSuppress, Validator};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/datahub.json")];

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Bool,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64(),
            Self::Bool => value.is_boolean(),
        }
    }
}

/// Field definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Set by the remote side; never configured
    #[serde(default)]
    pub computed: bool,
    /// Changing the value requires destroying and recreating the resource
    #[serde(default)]
    pub force_new: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub validate: Option<Validator>,
    #[serde(default)]
    pub diff_suppress: Option<DiffSuppress>,
    #[serde(default)]
    pub description: String,
}

/// Resource schema from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSchema {
    pub display_name: String,
    /// Fields whose values, joined, form the resource ID
    pub id_fields: Vec<String>,
    pub fields: Vec<FieldDef>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_field_names(&self) -> Vec<&str> {
        self.id_fields.iter().map(String::as_str).collect()
    }

    /// Fields an operator may set
    pub fn configurable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.computed)
    }

    /// Fill unset optional fields with their defaults
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        for field in self.configurable_fields() {
            if let Some(default) = &field.default {
                config
                    .entry(field.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }

    /// Check a configuration against the schema before anything is sent
    pub fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        for key in config.keys() {
            match self.field(key) {
                None => {
                    return Err(ProviderError::validation(key, "unknown field"));
                }
                Some(field) if field.computed => {
                    return Err(ProviderError::validation(key, "field is read-only"));
                }
                Some(_) => {}
            }
        }

        for field in self.configurable_fields() {
            let value = match config.get(&field.name) {
                Some(Value::Null) | None => {
                    if field.required {
                        return Err(ProviderError::validation(
                            &field.name,
                            "required field is not set",
                        ));
                    }
                    continue;
                }
                Some(value) => value,
            };

            if !field.field_type.accepts(value) {
                return Err(ProviderError::validation(
                    &field.name,
                    format!("expected {:?}, got {}", field.field_type, value),
                ));
            }

            if let Some(validator) = &field.validate {
                validator.check(&field.name, value)?;
            }
        }

        Ok(())
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceSchema>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource schema by type name
pub fn get_schema(type_name: &str) -> Option<&'static ResourceSchema> {
    get_registry().resources.get(type_name)
}

/// Look up a schema, failing for unknown type names
pub fn require_schema(type_name: &str) -> Result<&'static ResourceSchema> {
    get_schema(type_name).ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
}

/// Get all resource type names, sorted
pub fn get_all_resource_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    types.sort_unstable();
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert_eq!(registry.resources.len(), 3, "Registry should have three resources");
    }

    #[test]
    fn test_get_all_resource_types() {
        assert_eq!(
            get_all_resource_types(),
            vec![
                "alicloud_datahub_project",
                "alicloud_datahub_subscription",
                "alicloud_datahub_topic"
            ]
        );
    }

    #[test]
    fn test_topic_schema_shape() {
        let schema = get_schema("alicloud_datahub_topic").unwrap();
        assert_eq!(schema.id_field_names(), vec!["project_name", "topic_name"]);

        let force_new: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.force_new)
            .map(|f| f.name.as_str())
            .collect();
        assert!(force_new.contains(&"shard_count"));
        assert!(force_new.contains(&"record_type"));
        assert!(!force_new.contains(&"life_cycle"));
        assert!(!force_new.contains(&"comment"));
    }

    #[test]
    fn test_validate_accepts_valid_topic() {
        let schema = get_schema("alicloud_datahub_topic").unwrap();
        let cfg = config(json!({
            "project_name": "tf_test",
            "topic_name": "tf_topic",
            "shard_count": 3,
            "life_cycle": 7,
            "record_type": "BLOB"
        }));
        assert!(schema.validate(&cfg).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let schema = get_schema("alicloud_datahub_topic").unwrap();
        let base = json!({
            "project_name": "tf_test",
            "topic_name": "tf_topic",
            "shard_count": 3,
            "life_cycle": 7,
            "record_type": "BLOB"
        });

        let mut bad = config(base.clone());
        bad.insert("record_type".into(), json!("AVRO"));
        assert!(schema.validate(&bad).is_err());

        let mut bad = config(base.clone());
        bad.insert("shard_count".into(), json!(0));
        assert!(schema.validate(&bad).is_err());

        let mut bad = config(base.clone());
        bad.remove("life_cycle");
        assert!(schema.validate(&bad).is_err());

        let mut bad = config(base.clone());
        bad.insert("create_time".into(), json!("2024-01-01 00:00:00"));
        assert!(schema.validate(&bad).is_err());

        let mut bad = config(base);
        bad.insert("colour".into(), json!("blue"));
        assert!(schema.validate(&bad).is_err());
    }

    #[test]
    fn test_apply_defaults() {
        let schema = get_schema("alicloud_datahub_topic").unwrap();
        let mut cfg = config(json!({ "topic_name": "t" }));
        schema.apply_defaults(&mut cfg);
        assert_eq!(cfg["comment"], "topic added by terraform");

        let mut cfg = config(json!({ "comment": "mine" }));
        schema.apply_defaults(&mut cfg);
        assert_eq!(cfg["comment"], "mine");
    }
}
