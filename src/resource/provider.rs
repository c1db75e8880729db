//! Provider
//!
//! Owns the Datahub client and one handler per resource kind, and runs
//! operations by resource type name.

use super::data::{ResourceData, ResourceState};
use super::error::{ProviderError, Result};
use super::project::ProjectResource;
use super::registry::require_schema;
use super::retry::RetryPolicy;
use super::subscription::SubscriptionResource;
use super::topic::TopicResource;
use super::Resource;
use crate::datahub::client::DatahubApi;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Provider {
    client: Arc<dyn DatahubApi>,
    resources: HashMap<&'static str, Box<dyn Resource>>,
}

impl Provider {
    pub fn new(client: Arc<dyn DatahubApi>) -> Self {
        Self::with_delete_retry(client, RetryPolicy::default())
    }

    /// Provider whose handlers use `policy` for delete retries
    pub fn with_delete_retry(client: Arc<dyn DatahubApi>, policy: RetryPolicy) -> Self {
        let handlers: Vec<Box<dyn Resource>> = vec![
            Box::new(ProjectResource::with_retry(policy)),
            Box::new(TopicResource::with_retry(policy)),
            Box::new(SubscriptionResource::with_retry(policy)),
        ];

        let resources = handlers
            .into_iter()
            .map(|handler| (handler.type_name(), handler))
            .collect();

        Self { client, resources }
    }

    pub fn client(&self) -> &dyn DatahubApi {
        self.client.as_ref()
    }

    pub fn resource(&self, type_name: &str) -> Result<&dyn Resource> {
        self.resources
            .get(type_name)
            .map(|handler| &**handler)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Supported resource type names, sorted
    pub fn resource_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.resources.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Create a resource from its configuration
    pub async fn create(&self, type_name: &str, config: Map<String, Value>) -> Result<ResourceState> {
        let handler = self.resource(type_name)?;
        let mut d = ResourceData::new(require_schema(type_name)?, config);
        handler.create(&mut d, self.client()).await?;
        Ok(d.into_state())
    }

    /// Current state of a resource, or `None` if it no longer exists
    pub async fn read(&self, type_name: &str, id: &str) -> Result<Option<ResourceState>> {
        let handler = self.resource(type_name)?;
        let mut d = ResourceData::from_id(require_schema(type_name)?, id);
        handler.read(&mut d, self.client()).await?;

        let state = d.into_state();
        Ok((!state.is_gone()).then_some(state))
    }

    /// ForceNew fields that differ between `prior` and `config`
    pub fn requires_replacement(
        &self,
        type_name: &str,
        prior: &ResourceState,
        config: Map<String, Value>,
    ) -> Result<Vec<String>> {
        let d = ResourceData::from_state(require_schema(type_name)?, prior, config);
        Ok(d.requires_replacement())
    }

    /// Move an existing resource from `prior` to `config` in place
    ///
    /// Fails with [`ProviderError::RequiresReplacement`] if a ForceNew field
    /// changed.
    pub async fn update(
        &self,
        type_name: &str,
        prior: &ResourceState,
        config: Map<String, Value>,
    ) -> Result<ResourceState> {
        let handler = self.resource(type_name)?;
        let schema = require_schema(type_name)?;
        let mut d = ResourceData::from_state(schema, prior, config);
        schema.validate(d.config())?;

        let replace = d.requires_replacement();
        if !replace.is_empty() {
            return Err(ProviderError::RequiresReplacement {
                type_name: type_name.to_string(),
                fields: replace,
            });
        }

        handler.update(&mut d, self.client()).await?;
        Ok(d.into_state())
    }

    /// Converge a resource on `config`
    ///
    /// Creates when there is no prior state. When a ForceNew field changed
    /// the resource is destroyed and recreated if `allow_replace` is set.
    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<&ResourceState>,
        config: Map<String, Value>,
        allow_replace: bool,
    ) -> Result<ResourceState> {
        let prior = match prior {
            Some(prior) if !prior.is_gone() => prior,
            _ => return self.create(type_name, config).await,
        };

        let replace = self.requires_replacement(type_name, prior, config.clone())?;
        if replace.is_empty() {
            return self.update(type_name, prior, config).await;
        }
        if !allow_replace {
            return Err(ProviderError::RequiresReplacement {
                type_name: type_name.to_string(),
                fields: replace,
            });
        }

        tracing::info!("replacing {} '{}': {:?} changed", type_name, prior.id, replace);
        self.delete(type_name, &prior.id).await?;
        self.create(type_name, config).await
    }

    /// Delete a resource; succeeds if it is already gone
    pub async fn delete(&self, type_name: &str, id: &str) -> Result<()> {
        let handler = self.resource(type_name)?;
        let mut d = ResourceData::from_id(require_schema(type_name)?, id);
        handler.delete(&mut d, self.client()).await
    }

    /// Adopt an existing resource by ID
    pub async fn import(&self, type_name: &str, id: &str) -> Result<ResourceState> {
        self.read(type_name, id)
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                type_name: type_name.to_string(),
                id: id.to_string(),
            })
    }

    pub async fn exists(&self, type_name: &str, id: &str) -> Result<bool> {
        self.resource(type_name)?.exists(id, self.client()).await
    }
}
