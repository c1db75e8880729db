//! Datahub Models
//!
//! Projects, topics, subscriptions and the record schema carried by TUPLE topics.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Project information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub comment: String,
    pub create_time: u64,
    pub last_modify_time: u64,
}

/// How records are laid out inside a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    Tuple,
    Blob,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tuple => "TUPLE",
            Self::Blob => "BLOB",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TUPLE" => Ok(Self::Tuple),
            "BLOB" => Ok(Self::Blob),
            other => Err(SchemaError::UnknownRecordType(other.to_string())),
        }
    }
}

/// Column types allowed in a TUPLE record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Bigint,
    Double,
    Boolean,
    Timestamp,
    String,
    Decimal,
}

/// One column of a record schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, rename = "notnull", skip_serializing_if = "std::ops::Not::not")]
    pub not_null: bool,
}

/// Record schema of a TUPLE topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub fields: Vec<Field>,
}

/// Errors raised while interpreting record types and schemas
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("record schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("record schema must declare at least one field")]
    Empty,

    #[error("record schema declares field '{0}' more than once")]
    DuplicateField(String),

    #[error("unknown record type '{0}', expected TUPLE or BLOB")]
    UnknownRecordType(String),
}

impl RecordSchema {
    /// Parse and check a schema document such as
    /// `{"fields":[{"name":"id","type":"BIGINT"}]}`
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: RecordSchema = serde_json::from_str(json)?;

        if schema.fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        for field in &schema.fields {
            if !seen.insert(field.name.to_lowercase()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        Ok(schema)
    }

    /// Compact JSON form, as sent on the wire and stored in state
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Fields needed to create a topic
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSpec {
    pub project_name: String,
    pub topic_name: String,
    pub shard_count: u32,
    pub life_cycle: u32,
    pub comment: String,
    pub record_type: RecordType,
    pub record_schema: Option<RecordSchema>,
}

/// Topic information
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub project_name: String,
    pub topic_name: String,
    pub shard_count: u32,
    pub life_cycle: u32,
    pub comment: String,
    pub record_type: RecordType,
    pub record_schema: Option<RecordSchema>,
    pub create_time: u64,
    pub last_modify_time: u64,
}

impl Topic {
    /// Schema rendered for state; BLOB topics have none
    pub fn record_schema_json(&self) -> String {
        self.record_schema
            .as_ref()
            .map(RecordSchema::to_json)
            .unwrap_or_default()
    }
}

/// Subscription information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub project_name: String,
    pub topic_name: String,
    pub sub_id: String,
    pub comment: String,
    pub is_owner: bool,
    pub state: SubscriptionState,
    pub create_time: u64,
    pub last_modify_time: u64,
}

/// Whether a subscription is consuming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    Inactive,
    #[default]
    Active,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
        }
    }
}

impl From<i64> for SubscriptionState {
    fn from(value: i64) -> Self {
        if value == 0 {
            Self::Inactive
        } else {
            Self::Active
        }
    }
}

/// Render a Datahub timestamp (unix seconds) as `YYYY-MM-DD HH:MM:SS` UTC
pub fn format_unix_time(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}
