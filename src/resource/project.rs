//! `alicloud_datahub_project`

use super::data::ResourceData;
use super::error::{ProviderError, Result};
use super::id::parse_id;
use super::retry::{retry, RetryPolicy};
use super::{access_retry_error, delete_retry_error, found, Resource};
use crate::datahub::client::DatahubApi;
use crate::datahub::models::format_unix_time;
use async_trait::async_trait;

pub const TYPE_NAME: &str = "alicloud_datahub_project";
const ID_FIELDS: &[&str] = &["name"];

#[derive(Debug, Clone, Default)]
pub struct ProjectResource {
    delete_retry: RetryPolicy,
}

impl ProjectResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(delete_retry: RetryPolicy) -> Self {
        Self { delete_retry }
    }
}

fn project_name(id: &str) -> Result<String> {
    let mut parts = parse_id(id, TYPE_NAME, ID_FIELDS)?;
    Ok(parts.remove(0))
}

#[async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        d.schema().validate(d.config())?;
        let name = d.get_str("name").to_string();
        let comment = d.get_str("comment").to_string();

        tracing::info!("creating project {}", name);

        if let Err(e) = client.create_project(&name, &comment).await {
            d.set_id("");
            return Err(ProviderError::remote(
                format!("failed to create project '{}'", name),
                e,
            ));
        }

        d.set_id(name);
        self.update(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let name = project_name(d.id())?;

        let project = match client.get_project(&name).await {
            Ok(project) => project,
            Err(e) if e.is_not_found() => {
                tracing::warn!("project {} not found, removing it from state", name);
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return Err(ProviderError::remote(
                    format!("failed to access project '{}'", name),
                    e,
                ))
            }
        };

        d.set("name", project.name);
        d.set("comment", project.comment);
        d.set("create_time", format_unix_time(project.create_time));
        d.set("last_modify_time", format_unix_time(project.last_modify_time));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let name = project_name(d.id())?;

        if !d.is_new_resource() && d.has_change("comment") {
            let comment = d.get_str("comment").to_string();
            tracing::info!("updating project {}", name);

            client.update_project(&name, &comment).await.map_err(|e| {
                ProviderError::remote(format!("failed to update project '{}'", name), e)
            })?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &dyn DatahubApi) -> Result<()> {
        let owned = project_name(d.id())?;
        let name = owned.as_str();
        let label = format!("project '{}'", name);
        let what = label.as_str();

        let deleted = retry(&self.delete_retry, move || async move {
            match client.get_project(name).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => return Ok(false),
                Err(e) => return Err(access_retry_error(what, e)),
            }

            match client.delete_project(name).await {
                Ok(()) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) if e.code() == Some("InvalidStatus") => {
                    let blocked = match client.list_topics(name).await {
                        Ok(topics) if !topics.is_empty() => {
                            format!("{} (still holds topics: {})", what, topics.join(", "))
                        }
                        _ => what.to_string(),
                    };
                    Err(delete_retry_error(&blocked, e))
                }
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
        let name = project_name(id)?;
        found(
            client.get_project(&name).await,
            &format!("project '{}'", name),
        )
    }
}
