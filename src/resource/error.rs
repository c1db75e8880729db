//! Error types for resource operations

use crate::datahub::error::DatahubError;
use std::time::Duration;
use thiserror::Error;

/// Result type for resource handlers
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced by resource handlers
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// A field failed local validation; nothing was sent to Datahub
    #[error("invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    /// A stored ID does not have the expected shape
    #[error("invalid ID '{id}': {message}")]
    InvalidId { id: String, message: String },

    /// Datahub rejected a call
    #[error("{context} with error: {source}")]
    Remote {
        context: String,
        #[source]
        source: DatahubError,
    },

    /// A retried operation never succeeded before its deadline
    #[error("timeout after {elapsed:?}, last error: {last_error}")]
    Timeout {
        elapsed: Duration,
        last_error: Box<ProviderError>,
    },

    #[error("unknown resource type '{0}'")]
    UnknownResource(String),

    /// Import or refresh found nothing at the given ID
    #[error("{type_name} '{id}' not found")]
    NotFound { type_name: String, id: String },

    /// Fields that can only be set at creation time were changed
    #[error("cannot change {fields:?} of {type_name} in place; the resource must be recreated")]
    RequiresReplacement {
        type_name: String,
        fields: Vec<String>,
    },
}

impl ProviderError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn remote(context: impl Into<String>, source: DatahubError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// The Datahub error underneath, following timeouts to their last error
    pub fn datahub_error(&self) -> Option<&DatahubError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            Self::Timeout { last_error, .. } => last_error.datahub_error(),
            _ => None,
        }
    }
}
