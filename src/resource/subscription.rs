//! `alicloud_datahub_subscription`

use super::data::ResourceData;
use super::error::{ProviderError, Result};
use super::id::{compose_id, parse_id};
use super::retry::{retry, RetryPolicy};
use super::{access_retry_error, delete_retry_error, found, Resource};
use crate::datahub::client::DatahubApi;
use crate::datahub::models::format_unix_time;
use async_trait::async_trait;

pub const TYPE_NAME: &str = "alicloud_datahub_subscription";
const ID_FIELDS: &[&str] = &["project_name", "topic_name", "sub_id"];

#[derive(Debug, Clone, Default)]
pub struct SubscriptionResource {
    delete_retry: RetryPolicy,
}

impl SubscriptionResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(delete_retry: RetryPolicy) -> Self {
        Self { delete_retry }
    }
}

/// Project, topic and subscription id from a stored ID
struct SubscriptionId {
    project_name: String,
    topic_name: String,
    sub_id: String,
}

impl SubscriptionId {
    fn parse(id: &str) -> Result<Self> {
        let mut parts = parse_id(id, TYPE_NAME, ID_FIELDS)?.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(project_name), Some(topic_name), Some(sub_id)) => Ok(Self {
                project_name,
                topic_name,
                sub_id,
            }),
            _ => Err(ProviderError::InvalidId {
                id: id.to_string(),
                message: "expected project:topic:sub_id".to_string(),
            }),
        }
    }

    fn label(&self) -> String {
        format!(
            "subscription '{}/{}/{}'",
            self.project_name, self.topic_name, self.sub_id
        )
    }
}

#[async_trait]
impl Resource for SubscriptionResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        d.schema().validate(d.config())?;
        let project_name = d.get_str("project_name").to_string();
        let topic_name = d.get_str("topic_name").to_string();
        let comment = d.get_str("comment").to_string();

        tracing::info!("creating subscription on {}/{}", project_name, topic_name);

        let sub_id = match client
            .create_subscription(&project_name, &topic_name, &comment)
            .await
        {
            Ok(sub_id) => sub_id,
            Err(e) => {
                d.set_id("");
                return Err(ProviderError::remote(
                    format!(
                        "failed to create subscription on topic '{}/{}'",
                        project_name, topic_name
                    ),
                    e,
                ));
            }
        };

        d.set_id(compose_id(&[&project_name, &topic_name, &sub_id]));
        self.update(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let id = SubscriptionId::parse(d.id())?;

        let subscription = match client
            .get_subscription(&id.project_name, &id.topic_name, &id.sub_id)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) if e.is_not_found() => {
                tracing::warn!("{} not found, removing it from state", id.label());
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return Err(ProviderError::remote(
                    format!("failed to access {}", id.label()),
                    e,
                ))
            }
        };

        d.set("project_name", id.project_name.as_str());
        d.set("topic_name", subscription.topic_name);
        d.set("sub_id", subscription.sub_id);
        d.set("comment", subscription.comment);
        d.set("is_owner", subscription.is_owner);
        d.set("state", subscription.state.as_str());
        d.set("create_time", format_unix_time(subscription.create_time));
        d.set(
            "last_modify_time",
            format_unix_time(subscription.last_modify_time),
        );
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let id = SubscriptionId::parse(d.id())?;

        if !d.is_new_resource() && d.has_change("comment") {
            let comment = d.get_str("comment").to_string();
            tracing::info!("updating {}", id.label());

            client
                .update_subscription(&id.project_name, &id.topic_name, &id.sub_id, &comment)
                .await
                .map_err(|e| ProviderError::remote(format!("failed to update {}", id.label()), e))?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let id = SubscriptionId::parse(d.id())?;
        let (project_name, topic_name, sub_id) = (
            id.project_name.as_str(),
            id.topic_name.as_str(),
            id.sub_id.as_str(),
        );
        let label = id.label();
        let what = label.as_str();

        let deleted = retry(&self.delete_retry, move || async move {
            match client
                .get_subscription(project_name, topic_name, sub_id)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_not_found() => return Ok(false),
                Err(e) => return Err(access_retry_error(what, e)),
            }

            match client
                .delete_subscription(project_name, topic_name, sub_id)
                .await
            {
                Ok(()) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(delete_retry_error(what, e)),
            }
        })
        .await?;

        if deleted {
            tracing::info!("deleted {}", what);
        } else {
            tracing::warn!("{} already gone", what);
        }
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, id: &str, client: &dyn DatahubApi) -> Result<bool> {
        let id = SubscriptionId::parse(id)?;
        found(
            client
                .get_subscription(&id.project_name, &id.topic_name, &id.sub_id)
                .await,
            &id.label(),
        )
    }
}
