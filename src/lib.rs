//! Lifecycle management for Alibaba Cloud Datahub resources.
//!
//! The crate has two layers:
//!
//! - [`datahub`] - a REST client for the Datahub service (signing, transport,
//!   typed models and errors, and the blocking/queued/callback call variants)
//! - [`resource`] - declarative resource kinds (`alicloud_datahub_project`,
//!   `alicloud_datahub_topic`, `alicloud_datahub_subscription`) with their
//!   schemas and create/read/update/delete handlers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use datahub_provider::datahub::client::DatahubClient;
//! use datahub_provider::resource::Provider;
//!
//! async fn example(client: DatahubClient) -> anyhow::Result<()> {
//!     let provider = Provider::new(Arc::new(client));
//!     let state = provider.read("alicloud_datahub_topic", "my_project:my_topic").await?;
//!     println!("{state:?}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod datahub;
pub mod resource;

/// Version injected at compile time via DATAHUB_PROVIDER_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DATAHUB_PROVIDER_VERSION") {
    Some(v) => v,
    None => "dev",
};
