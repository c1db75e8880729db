//! Acceptance checks
//!
//! Assertions over a recorded state, for tests that drive the provider
//! through several steps and then verify what Datahub holds.

use super::data::ResourceState;
use super::provider::Provider;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// A resource as recorded after a step
#[derive(Debug, Clone)]
pub struct RecordedResource {
    pub type_name: String,
    pub state: ResourceState,
}

/// Resources keyed by address, e.g. `alicloud_datahub_topic.basic`
#[derive(Debug, Clone, Default)]
pub struct RecordedState {
    resources: BTreeMap<String, RecordedResource>,
}

impl RecordedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `state` at `address`; the type name is the part before the first `.`
    pub fn record(&mut self, address: &str, state: ResourceState) {
        let type_name = address.split('.').next().unwrap_or(address).to_string();
        self.resources
            .insert(address.to_string(), RecordedResource { type_name, state });
    }

    pub fn get(&self, address: &str) -> Option<&RecordedResource> {
        self.resources.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RecordedResource)> {
        self.resources.iter()
    }
}

/// Fail unless the resource at `address` has an ID and exists in Datahub
pub async fn check_exists(provider: &Provider, state: &RecordedState, address: &str) -> Result<()> {
    let Some(recorded) = state.get(address) else {
        bail!("not found in state: {}", address);
    };
    if recorded.state.id.is_empty() {
        bail!("no ID is set for {}", address);
    }

    let exists = provider
        .exists(&recorded.type_name, &recorded.state.id)
        .await
        .with_context(|| format!("failed to look up {}", address))?;
    if !exists {
        bail!("{} '{}' does not exist", recorded.type_name, recorded.state.id);
    }
    Ok(())
}

/// Fail if any recorded resource of `type_name` still exists in Datahub
pub async fn check_destroyed(provider: &Provider, state: &RecordedState, type_name: &str) -> Result<()> {
    for (address, recorded) in state.iter() {
        if recorded.type_name != type_name || recorded.state.id.is_empty() {
            continue;
        }

        let exists = provider
            .exists(type_name, &recorded.state.id)
            .await
            .with_context(|| format!("failed to look up {}", address))?;
        if exists {
            bail!("{} {} still exists", type_name, recorded.state.id);
        }
    }
    Ok(())
}

/// Fail unless the attribute `key` at `address` renders as `expected`
pub fn check_attr(state: &RecordedState, address: &str, key: &str, expected: &str) -> Result<()> {
    let recorded = state
        .get(address)
        .with_context(|| format!("not found in state: {}", address))?;

    let actual = match recorded.state.attr(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => bail!("{}: attribute '{}' is not set", address, key),
        Some(other) => other.to_string(),
    };

    if actual != expected {
        bail!(
            "{}: attribute '{}' expected {:?}, got {:?}",
            address,
            key,
            expected,
            actual
        );
    }
    Ok(())
}
