//! Datahub Client
//!
//! Main client for the Datahub REST API, combining credentials, the HTTP
//! transport and the async worker pool.

use super::auth::Credentials;
use super::error::{DatahubError, Result};
use super::http::DatahubHttpClient;
use super::models::{Project, RecordSchema, Subscription, Topic, TopicSpec};
use super::pool::WorkerPool;
use super::requests::*;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

/// Default region when none is configured
pub const DEFAULT_REGION: &str = "cn-hangzhou";

/// Public endpoint of the Datahub service in a region
pub fn default_endpoint(region: &str) -> String {
    format!("https://dh-{}.aliyuncs.com", region)
}

/// Operations the resource handlers need from Datahub
///
/// Implemented by [`DatahubClient`] against the real service and, with the
/// `testing` feature, by an in-memory `MockDatahub`.
#[async_trait]
pub trait DatahubApi: Send + Sync {
    async fn create_project(&self, project_name: &str, comment: &str) -> Result<()>;
    async fn get_project(&self, project_name: &str) -> Result<Project>;
    async fn update_project(&self, project_name: &str, comment: &str) -> Result<()>;
    async fn delete_project(&self, project_name: &str) -> Result<()>;

    async fn list_topics(&self, project_name: &str) -> Result<Vec<String>>;
    async fn create_topic(&self, topic: &TopicSpec) -> Result<()>;
    async fn get_topic(&self, project_name: &str, topic_name: &str) -> Result<Topic>;
    async fn update_topic(
        &self,
        project_name: &str,
        topic_name: &str,
        life_cycle: u32,
        comment: &str,
    ) -> Result<()>;
    async fn delete_topic(&self, project_name: &str, topic_name: &str) -> Result<()>;

    /// Returns the service-assigned subscription id
    async fn create_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        comment: &str,
    ) -> Result<String>;
    async fn get_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
    ) -> Result<Subscription>;
    async fn update_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
        comment: &str,
    ) -> Result<()>;
    async fn delete_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
    ) -> Result<()>;
}

/// Main Datahub client
///
/// Cloning is cheap; clones share the HTTP connection pool and the async
/// worker pool.
#[derive(Clone)]
pub struct DatahubClient {
    pub credentials: Credentials,
    pub http: DatahubHttpClient,
    pub endpoint: Url,
    pool: Arc<WorkerPool>,
}

impl DatahubClient {
    /// Create a new Datahub client
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self> {
        Self::with_pool(endpoint, credentials, WorkerPool::default())
    }

    /// Create a client with a custom worker pool
    pub fn with_pool(endpoint: &str, credentials: Credentials, pool: WorkerPool) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| DatahubError::Credentials(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        // Request paths are joined relative to the endpoint, so a path prefix
        // must end in `/` to survive the join
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            credentials,
            http: DatahubHttpClient::new()?,
            endpoint,
            pool: Arc::new(pool),
        })
    }

    /// Build an API URL from a request path
    pub fn url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|e| DatahubError::Decode(format!("invalid request path '{}': {}", path, e)))
    }

    /// Invoke an action and wait for its response
    pub async fn do_action<A: Action>(&self, request: &A) -> Result<A::Response> {
        tracing::debug!("invoke {}", A::NAME);

        let url = self.url(&request.path())?;
        let body = request.body();
        let value = self
            .http
            .execute(request.method(), &url, body.as_ref(), &self.credentials)
            .await?;

        serde_json::from_value(value)
            .map_err(|e| DatahubError::Decode(format!("{} response: {}", A::NAME, e)))
    }

    /// Invoke an action on the worker pool
    ///
    /// The receiver yields the result once the action completes. If the task
    /// cannot be queued the receiver yields that error immediately.
    pub fn do_action_queued<A: Action>(&self, request: A) -> oneshot::Receiver<Result<A::Response>> {
        let (tx, rx) = oneshot::channel();
        let (handoff_tx, handoff_rx) = oneshot::channel::<oneshot::Sender<Result<A::Response>>>();

        let client = self.clone();
        let queued = self.pool.add_task(async move {
            let response = client.do_action(&request).await;
            if let Ok(tx) = handoff_rx.await {
                let _ = tx.send(response);
            }
        });

        match queued {
            Ok(()) => {
                let _ = handoff_tx.send(tx);
            }
            Err(err) => {
                let _ = tx.send(Err(err));
            }
        }

        rx
    }

    /// Invoke an action on the worker pool and hand the result to `callback`
    ///
    /// The receiver yields `true` once the callback ran on the pool, or
    /// `false` if the task could not be queued (the callback is then invoked
    /// immediately with the queueing error).
    pub fn do_action_with_callback<A, F>(&self, request: A, callback: F) -> oneshot::Receiver<bool>
    where
        A: Action,
        F: FnOnce(Result<A::Response>) + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let (cb_tx, cb_rx) = oneshot::channel::<(F, oneshot::Sender<bool>)>();

        let client = self.clone();
        let queued = self.pool.add_task(async move {
            let response = client.do_action(&request).await;
            if let Ok((callback, done_tx)) = cb_rx.await {
                callback(response);
                let _ = done_tx.send(true);
            }
        });

        match queued {
            Ok(()) => {
                let _ = cb_tx.send((callback, done_tx));
            }
            Err(err) => {
                callback(Err(err));
                let _ = done_tx.send(false);
            }
        }

        done_rx
    }

    /// Stop the worker pool, letting queued actions finish
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[async_trait]
impl DatahubApi for DatahubClient {
    async fn create_project(&self, project_name: &str, comment: &str) -> Result<()> {
        self.do_action(&CreateProjectRequest {
            project_name: project_name.to_string(),
            comment: comment.to_string(),
        })
        .await
        .map(drop)
    }

    async fn get_project(&self, project_name: &str) -> Result<Project> {
        let resp = self
            .do_action(&GetProjectRequest {
                project_name: project_name.to_string(),
            })
            .await?;

        Ok(Project {
            name: project_name.to_string(),
            comment: resp.comment,
            create_time: resp.create_time,
            last_modify_time: resp.last_modify_time,
        })
    }

    async fn update_project(&self, project_name: &str, comment: &str) -> Result<()> {
        self.do_action(&UpdateProjectRequest {
            project_name: project_name.to_string(),
            comment: comment.to_string(),
        })
        .await
        .map(drop)
    }

    async fn delete_project(&self, project_name: &str) -> Result<()> {
        self.do_action(&DeleteProjectRequest {
            project_name: project_name.to_string(),
        })
        .await
        .map(drop)
    }

    async fn list_topics(&self, project_name: &str) -> Result<Vec<String>> {
        let resp = self
            .do_action(&ListTopicsRequest {
                project_name: project_name.to_string(),
            })
            .await?;
        Ok(resp.topic_names)
    }

    async fn create_topic(&self, topic: &TopicSpec) -> Result<()> {
        self.do_action(&CreateTopicRequest {
            topic: topic.clone(),
        })
        .await
        .map(drop)
    }

    async fn get_topic(&self, project_name: &str, topic_name: &str) -> Result<Topic> {
        let resp = self
            .do_action(&GetTopicRequest {
                project_name: project_name.to_string(),
                topic_name: topic_name.to_string(),
            })
            .await?;

        let record_schema = if resp.record_schema.trim().is_empty() {
            None
        } else {
            Some(
                RecordSchema::from_json(&resp.record_schema)
                    .map_err(|e| DatahubError::Decode(format!("GetTopic record schema: {}", e)))?,
            )
        };

        Ok(Topic {
            project_name: project_name.to_string(),
            topic_name: topic_name.to_string(),
            shard_count: resp.shard_count,
            life_cycle: resp.lifecycle,
            comment: resp.comment,
            record_type: resp.record_type,
            record_schema,
            create_time: resp.create_time,
            last_modify_time: resp.last_modify_time,
        })
    }

    async fn update_topic(
        &self,
        project_name: &str,
        topic_name: &str,
        life_cycle: u32,
        comment: &str,
    ) -> Result<()> {
        self.do_action(&UpdateTopicRequest {
            project_name: project_name.to_string(),
            topic_name: topic_name.to_string(),
            life_cycle,
            comment: comment.to_string(),
        })
        .await
        .map(drop)
    }

    async fn delete_topic(&self, project_name: &str, topic_name: &str) -> Result<()> {
        self.do_action(&DeleteTopicRequest {
            project_name: project_name.to_string(),
            topic_name: topic_name.to_string(),
        })
        .await
        .map(drop)
    }

    async fn create_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        comment: &str,
    ) -> Result<String> {
        let resp = self
            .do_action(&CreateSubscriptionRequest {
                project_name: project_name.to_string(),
                topic_name: topic_name.to_string(),
                comment: comment.to_string(),
            })
            .await?;
        Ok(resp.sub_id)
    }

    async fn get_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
    ) -> Result<Subscription> {
        let resp = self
            .do_action(&GetSubscriptionRequest {
                project_name: project_name.to_string(),
                topic_name: topic_name.to_string(),
                sub_id: sub_id.to_string(),
            })
            .await?;

        Ok(Subscription {
            project_name: project_name.to_string(),
            topic_name: if resp.topic_name.is_empty() {
                topic_name.to_string()
            } else {
                resp.topic_name
            },
            sub_id: resp.sub_id,
            comment: resp.comment,
            is_owner: resp.is_owner,
            state: resp.state.into(),
            create_time: resp.create_time,
            last_modify_time: resp.last_modify_time,
        })
    }

    async fn update_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
        comment: &str,
    ) -> Result<()> {
        self.do_action(&UpdateSubscriptionRequest {
            project_name: project_name.to_string(),
            topic_name: topic_name.to_string(),
            sub_id: sub_id.to_string(),
            comment: comment.to_string(),
        })
        .await
        .map(drop)
    }

    async fn delete_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
    ) -> Result<()> {
        self.do_action(&DeleteSubscriptionRequest {
            project_name: project_name.to_string(),
            topic_name: topic_name.to_string(),
            sub_id: sub_id.to_string(),
        })
        .await
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> DatahubClient {
        DatahubClient::new(endpoint, Credentials::new("ak", "sk")).unwrap()
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(default_endpoint("cn-beijing"), "https://dh-cn-beijing.aliyuncs.com");
    }

    #[test]
    fn test_url_joins_path() {
        let c = client("https://dh-cn-beijing.aliyuncs.com");
        assert_eq!(
            c.url("/projects/p/topics/t").unwrap().as_str(),
            "https://dh-cn-beijing.aliyuncs.com/projects/p/topics/t"
        );
    }

    #[test]
    fn test_url_keeps_endpoint_prefix() {
        let c = client("https://gateway.example.com/datahub");
        assert_eq!(
            c.url("/projects/p/topics/t").unwrap().as_str(),
            "https://gateway.example.com/datahub/projects/p/topics/t"
        );

        let c = client("https://gateway.example.com/datahub/");
        assert_eq!(
            c.url("/projects/p").unwrap().as_str(),
            "https://gateway.example.com/datahub/projects/p"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(DatahubClient::new("not a url", Credentials::new("ak", "sk")).is_err());
    }

    #[tokio::test]
    async fn test_queued_on_closed_pool_reports_error() {
        let c = client("http://127.0.0.1:9");
        c.shutdown().await;

        let rx = c.do_action_queued(GetProjectRequest {
            project_name: "p".into(),
        });
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(DatahubError::PoolClosed(_))));
    }

    #[tokio::test]
    async fn test_callback_on_closed_pool_invoked_inline() {
        let c = client("http://127.0.0.1:9");
        c.shutdown().await;

        let (tx, rx) = std::sync::mpsc::channel();
        let done = c.do_action_with_callback(
            DeleteProjectRequest {
                project_name: "p".into(),
            },
            move |result| {
                let _ = tx.send(result.is_err());
            },
        );

        assert!(!done.await.unwrap());
        assert!(rx.recv().unwrap());
    }
}
