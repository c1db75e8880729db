//! `alicloud_datahub_topic`

use super::data::ResourceData;
use super::error::{ProviderError, Result};
use super::id::{compose_id, parse_id};
use super::retry::{retry, RetryPolicy};
use super::{access_retry_error, delete_retry_error, found, Resource};
use crate::datahub::client::DatahubApi;
use crate::datahub::models::{format_unix_time, RecordSchema, RecordType, SchemaError, TopicSpec};
use async_trait::async_trait;

pub const TYPE_NAME: &str = "alicloud_datahub_topic";
const ID_FIELDS: &[&str] = &["project_name", "topic_name"];

#[derive(Debug, Clone, Default)]
pub struct TopicResource {
    delete_retry: RetryPolicy,
}

impl TopicResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(delete_retry: RetryPolicy) -> Self {
        Self { delete_retry }
    }
}

/// Build the create request, rejecting bad record types and schemas locally
fn topic_spec(d: &ResourceData) -> Result<TopicSpec> {
    let project_name = d.get_str("project_name");
    let topic_name = d.get_str("topic_name");

    let record_type: RecordType = d
        .get_str("record_type")
        .parse()
        .map_err(|e: SchemaError| ProviderError::validation("record_type", e.to_string()))?;

    let record_schema = match record_type {
        RecordType::Tuple => {
            let raw = d.get_str("record_schema");
            let schema = RecordSchema::from_json(raw).map_err(|e| {
                ProviderError::validation(
                    "record_schema",
                    format!(
                        "failed to create topic '{}/{}' with invalid record schema: {}",
                        project_name, topic_name, e
                    ),
                )
            })?;
            Some(schema)
        }
        RecordType::Blob => {
            if !d.get_str("record_schema").trim().is_empty() {
                return Err(ProviderError::validation(
                    "record_schema",
                    format!(
                        "topic '{}/{}' is BLOB; record_schema is only allowed for TUPLE topics",
                        project_name, topic_name
                    ),
                ));
            }
            None
        }
    };

    Ok(TopicSpec {
        project_name: project_name.to_string(),
        topic_name: topic_name.to_string(),
        shard_count: d.get_u32("shard_count")?,
        life_cycle: d.get_u32("life_cycle")?,
        comment: d.get_str("comment").to_string(),
        record_type,
        record_schema,
    })
}

#[async_trait]
impl Resource for TopicResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        d.schema().validate(d.config())?;
        let spec = topic_spec(d)?;

        tracing::info!(
            "creating topic {}/{} ({}, {} shards)",
            spec.project_name,
            spec.topic_name,
            spec.record_type,
            spec.shard_count
        );

        if let Err(e) = client.create_topic(&spec).await {
            d.set_id("");
            return Err(ProviderError::remote(
                format!(
                    "failed to create topic '{}/{}'",
                    spec.project_name, spec.topic_name
                ),
                e,
            ));
        }

        d.set_id(compose_id(&[&spec.project_name, &spec.topic_name]));
        self.update(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let parts = parse_id(d.id(), TYPE_NAME, ID_FIELDS)?;
        let (project_name, topic_name) = (&parts[0], &parts[1]);

        let topic = match client.get_topic(project_name, topic_name).await {
            Ok(topic) => topic,
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "topic {}/{} not found, removing it from state",
                    project_name,
                    topic_name
                );
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return Err(ProviderError::remote(
                    format!("failed to access topic '{}/{}'", project_name, topic_name),
                    e,
                ))
            }
        };

        d.set("project_name", topic.project_name.as_str());
        d.set("topic_name", topic.topic_name.as_str());
        d.set("shard_count", topic.shard_count);
        d.set("life_cycle", topic.life_cycle);
        d.set("comment", topic.comment.as_str());
        d.set("record_type", topic.record_type.as_str());
        d.set("record_schema", topic.record_schema_json());
        d.set("create_time", format_unix_time(topic.create_time));
        d.set("last_modify_time", format_unix_time(topic.last_modify_time));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let parts = parse_id(d.id(), TYPE_NAME, ID_FIELDS)?;
        let (project_name, topic_name) = (&parts[0], &parts[1]);

        if !d.is_new_resource() && (d.has_change("life_cycle") || d.has_change("comment")) {
            let life_cycle = d.get_u32("life_cycle")?;
            let comment = d.get_str("comment").to_string();

            tracing::info!(
                "updating topic {}/{}: life_cycle={}",
                project_name,
                topic_name,
                life_cycle
            );

            client
                .update_topic(project_name, topic_name, life_cycle, &comment)
                .await
                .map_err(|e| {
                    ProviderError::remote(
                        format!("failed to update topic '{}/{}'", project_name, topic_name),
                        e,
                    )
                })?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let parts = parse_id(d.id(), TYPE_NAME, ID_FIELDS)?;
        let (project_name, topic_name) = (parts[0].as_str(), parts[1].as_str());
        let label = format!("topic '{}/{}'", project_name, topic_name);
        let what = label.as_str();

        let deleted = retry(&self.delete_retry, move || async move {
            match client.get_topic(project_name, topic_name).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => return Ok(false),
                Err(e) => return Err(access_retry_error(what, e)),
            }

            match client.delete_topic(project_name, topic_name).await {
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
        let parts = parse_id(id, TYPE_NAME, ID_FIELDS)?;
        found(
            client.get_topic(&parts[0], &parts[1]).await,
            &format!("topic '{}/{}'", parts[0], parts[1]),
        )
    }
}
