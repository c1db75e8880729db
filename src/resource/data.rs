//! Resource data
//!
//! The object a handler works on: the desired configuration, the values
//! last read from Datahub, the resource ID and whether the resource is being
//! created in this run.

use super::error::{ProviderError, Result};
use super::registry::{FieldDef, ResourceSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stored outcome of a handler run
///
/// An empty `id` means the resource no longer exists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: &'static ResourceSchema,
    id: String,
    state: Map<String, Value>,
    config: Map<String, Value>,
    new_resource: bool,
}

impl ResourceData {
    /// Data for a resource about to be created
    ///
    /// Defaults are filled in for optional fields the configuration leaves unset.
    pub fn new(schema: &'static ResourceSchema, mut config: Map<String, Value>) -> Self {
        schema.apply_defaults(&mut config);
        Self {
            schema,
            id: String::new(),
            state: Map::new(),
            config,
            new_resource: true,
        }
    }

    /// Data for an existing resource known only by its ID (read, delete, import)
    pub fn from_id(schema: &'static ResourceSchema, id: impl Into<String>) -> Self {
        Self {
            schema,
            id: id.into(),
            state: Map::new(),
            config: Map::new(),
            new_resource: false,
        }
    }

    /// Data for an existing resource moving from `prior` to `config`
    pub fn from_state(
        schema: &'static ResourceSchema,
        prior: &ResourceState,
        mut config: Map<String, Value>,
    ) -> Self {
        schema.apply_defaults(&mut config);
        Self {
            schema,
            id: prior.id.clone(),
            state: prior.attributes.clone(),
            config,
            new_resource: false,
        }
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty ID marks the resource as gone
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// Desired value if configured, otherwise the stored one
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.config.get(key) {
            Some(Value::Null) | None => self.state.get(key),
            Some(value) => Some(value),
        }
    }

    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Integer field that must fit a `u32`
    pub fn get_u32(&self, key: &str) -> Result<u32> {
        let value = self
            .get_int(key)
            .ok_or_else(|| ProviderError::validation(key, "required field is not set"))?;
        u32::try_from(value)
            .map_err(|_| ProviderError::validation(key, format!("{} is out of range", value)))
    }

    /// Record a value read from Datahub
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.state.insert(key.to_string(), value.into());
    }

    /// Whether the configured value differs from the stored one, after
    /// the field's diff suppression
    pub fn has_change(&self, key: &str) -> bool {
        let Some(new) = self.config.get(key).filter(|v| !v.is_null()) else {
            return false;
        };
        differs(self.schema.field(key), self.state.get(key), new)
    }

    /// ForceNew fields whose configured value differs from the stored one
    pub fn requires_replacement(&self) -> Vec<String> {
        if self.new_resource {
            return Vec::new();
        }
        self.schema
            .fields
            .iter()
            .filter(|f| f.force_new && self.has_change(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Stored state after the handler finished
    pub fn into_state(self) -> ResourceState {
        ResourceState {
            id: self.id,
            attributes: self.state,
        }
    }
}

fn as_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn differs(field: Option<&FieldDef>, old: Option<&Value>, new: &Value) -> bool {
    if let Some(suppress) = field.and_then(|f| f.diff_suppress) {
        return !suppress.suppress(&as_text(old), &as_text(Some(new)));
    }
    match old {
        Some(old) => old != new,
        None => !(new.is_string() && as_text(Some(new)).is_empty()),
    }
}
