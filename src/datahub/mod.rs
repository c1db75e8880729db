//! Datahub API interaction module
//!
//! This module provides the core functionality for talking to the Alibaba Cloud
//! Datahub REST API.
//!
//! # Module Structure
//!
//! - [`auth`] - Access key credentials and request signing
//! - [`client`] - Main Datahub client and the [`client::DatahubApi`] trait
//! - [`error`] - Typed API errors
//! - [`http`] - HTTP transport for REST calls
//! - `mock` - In-memory Datahub used by tests (`testing` feature)
//! - [`models`] - Projects, topics, subscriptions and record schemas
//! - [`pool`] - Bounded worker pool behind the queued and callback call variants
//! - [`requests`] - One request type per API action
//!
//! # Example
//!
//! ```ignore
//! use crate::datahub::client::{DatahubApi, DatahubClient};
//!
//! async fn example(client: &DatahubClient) -> anyhow::Result<()> {
//!     let topic = client.get_topic("my_project", "my_topic").await?;
//!     println!("{} shards", topic.shard_count);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod models;
pub mod pool;
pub mod requests;
