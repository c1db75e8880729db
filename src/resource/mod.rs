//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing Datahub resources.
//! Field definitions are loaded from JSON files at compile time; the
//! handlers translate create/read/update/delete into Datahub calls.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource schemas from embedded JSON
//! - [`data`] - Desired and stored values a handler works on
//! - [`project`], [`topic`], [`subscription`] - CRUD handlers per resource kind
//! - [`provider`] - Dispatches operations by resource type name
//! - [`check`] - Existence and destroy checks for acceptance tests
//!
//! # Resource Definitions
//!
//! Resources are defined in `src/resources/datahub.json`:
//! - `alicloud_datahub_project`
//! - `alicloud_datahub_topic`
//! - `alicloud_datahub_subscription`
//!
//! # Example
//!
//! ```ignore
//! use crate::resource::{get_schema, ResourceData, Resource, topic::TopicResource};
//!
//! async fn refresh(client: &dyn DatahubApi) -> anyhow::Result<()> {
//!     let mut d = ResourceData::from_id(get_schema("alicloud_datahub_topic").unwrap(), "p:t");
//!     TopicResource::new().read(&mut d, client).await?;
//!     Ok(())
//! }
//! ```

pub mod check;
pub mod data;
pub mod error;
pub mod id;
pub mod project;
pub mod provider;
mod registry;
pub mod retry;
pub mod subscription;
pub mod topic;
pub mod validate;

pub use data::{ResourceData, ResourceState};
pub use error::{ProviderError, Result};
pub use provider::Provider;
pub use registry::*;

use crate::datahub::client::DatahubApi;
use crate::datahub::error::DatahubError;
use async_trait::async_trait;
use retry::RetryError;

/// Error codes on which a delete is retried with the error attached
pub const DELETE_RETRYABLE_CODES: &[&str] = &["AuthFailed", "InvalidStatus", "ValidationFailed"];

/// Create, read, update and delete one kind of Datahub resource
///
/// Handlers are stateless apart from their retry settings; the client is
/// passed in on every call.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `alicloud_datahub_topic`
    fn type_name(&self) -> &'static str;

    /// Create the resource and populate `d` from Datahub
    async fn create(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()>;

    /// Refresh `d`; clears the ID if the resource is gone
    async fn read(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()>;

    /// Apply changes to mutable fields, then refresh
    async fn update(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()>;

    /// Delete the resource, tolerating its absence
    async fn delete(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()>;

    /// Whether a resource with this ID exists
    async fn exists(&self, id: &str, client: &dyn DatahubApi) -> Result<bool>;
}

/// Classify a failed delete call
///
/// Every failure is retried. Known transient codes keep their own context;
/// anything else is reported as a timeout if the deadline passes.
pub(crate) fn delete_retry_error(what: &str, err: DatahubError) -> RetryError {
    let context = if err.is_expected(DELETE_RETRYABLE_CODES) {
        format!("failed to delete {}", what)
    } else {
        format!("deleting {} timed out", what)
    };
    RetryError::retryable(ProviderError::remote(context, err))
}

/// Classify a failed existence check during delete
pub(crate) fn access_retry_error(what: &str, err: DatahubError) -> RetryError {
    RetryError::retryable(ProviderError::remote(
        format!("while deleting {}, failed to access it", what),
        err,
    ))
}

/// Map a lookup result to existence, treating not-found as absent
pub(crate) fn found<T>(result: crate::datahub::error::Result<T>, what: &str) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(ProviderError::remote(format!("failed to describe {}", what), e)),
    }
}
