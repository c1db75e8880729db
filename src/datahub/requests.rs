//! API Requests
//!
//! One request type per Datahub action. Each type knows its HTTP method,
//! path and body, and names the wire response it decodes into; the client
//! runs all of them through the same marshal-and-invoke step.

use super::models::{RecordType, TopicSpec};
use reqwest::Method;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::{json, Value};

/// A single Datahub API action
pub trait Action: Send + Sync + 'static {
    /// Decoded response body (`IgnoredAny` for actions that return nothing)
    type Response: DeserializeOwned + Send + 'static;

    /// Action name used in logs
    const NAME: &'static str;

    fn method(&self) -> Method;

    /// Path relative to the endpoint, already percent-encoded
    fn path(&self) -> String;

    fn body(&self) -> Option<Value> {
        None
    }
}

fn segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn project_path(project: &str) -> String {
    format!("/projects/{}", segment(project))
}

fn topic_path(project: &str, topic: &str) -> String {
    format!("{}/topics/{}", project_path(project), segment(topic))
}

fn subscription_path(project: &str, topic: &str, sub_id: &str) -> String {
    format!(
        "{}/subscriptions/{}",
        topic_path(project, topic),
        segment(sub_id)
    )
}

// =============================================================================
// Projects
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    pub project_name: String,
    pub comment: String,
}

impl Action for CreateProjectRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "CreateProject";

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        project_path(&self.project_name)
    }

    fn body(&self) -> Option<Value> {
        Some(json!({ "Comment": self.comment }))
    }
}

#[derive(Debug, Clone)]
pub struct GetProjectRequest {
    pub project_name: String,
}

/// Response body of GetProject
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetProjectResponse {
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub create_time: u64,
    #[serde(default)]
    pub last_modify_time: u64,
}

impl Action for GetProjectRequest {
    type Response = GetProjectResponse;
    const NAME: &'static str = "GetProject";

    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        project_path(&self.project_name)
    }
}

#[derive(Debug, Clone)]
pub struct UpdateProjectRequest {
    pub project_name: String,
    pub comment: String,
}

impl Action for UpdateProjectRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "UpdateProject";

    fn method(&self) -> Method {
        Method::PUT
    }

    fn path(&self) -> String {
        project_path(&self.project_name)
    }

    fn body(&self) -> Option<Value> {
        Some(json!({ "Comment": self.comment }))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteProjectRequest {
    pub project_name: String,
}

impl Action for DeleteProjectRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "DeleteProject";

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path(&self) -> String {
        project_path(&self.project_name)
    }
}

// =============================================================================
// Topics
// =============================================================================

#[derive(Debug, Clone)]
pub struct ListTopicsRequest {
    pub project_name: String,
}

/// Response body of ListTopics
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTopicsResponse {
    #[serde(default)]
    pub topic_names: Vec<String>,
}

impl Action for ListTopicsRequest {
    type Response = ListTopicsResponse;
    const NAME: &'static str = "ListTopics";

    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        format!("{}/topics", project_path(&self.project_name))
    }
}

#[derive(Debug, Clone)]
pub struct CreateTopicRequest {
    pub topic: TopicSpec,
}

impl Action for CreateTopicRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "CreateTopic";

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        topic_path(&self.topic.project_name, &self.topic.topic_name)
    }

    fn body(&self) -> Option<Value> {
        let mut body = json!({
            "Action": "create",
            "ShardCount": self.topic.shard_count,
            "Lifecycle": self.topic.life_cycle,
            "RecordType": self.topic.record_type.as_str(),
            "Comment": self.topic.comment,
        });
        if let (RecordType::Tuple, Some(schema)) =
            (self.topic.record_type, &self.topic.record_schema)
        {
            body["RecordSchema"] = Value::String(schema.to_json());
        }
        Some(body)
    }
}

#[derive(Debug, Clone)]
pub struct GetTopicRequest {
    pub project_name: String,
    pub topic_name: String,
}

/// Response body of GetTopic
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetTopicResponse {
    pub shard_count: u32,
    pub lifecycle: u32,
    pub record_type: RecordType,
    /// Schema document as a JSON string; empty for BLOB topics
    #[serde(default)]
    pub record_schema: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub create_time: u64,
    #[serde(default)]
    pub last_modify_time: u64,
}

impl Action for GetTopicRequest {
    type Response = GetTopicResponse;
    const NAME: &'static str = "GetTopic";

    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        topic_path(&self.project_name, &self.topic_name)
    }
}

#[derive(Debug, Clone)]
pub struct UpdateTopicRequest {
    pub project_name: String,
    pub topic_name: String,
    pub life_cycle: u32,
    pub comment: String,
}

impl Action for UpdateTopicRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "UpdateTopic";

    fn method(&self) -> Method {
        Method::PUT
    }

    fn path(&self) -> String {
        topic_path(&self.project_name, &self.topic_name)
    }

    fn body(&self) -> Option<Value> {
        Some(json!({
            "Lifecycle": self.life_cycle,
            "Comment": self.comment,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteTopicRequest {
    pub project_name: String,
    pub topic_name: String,
}

impl Action for DeleteTopicRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "DeleteTopic";

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path(&self) -> String {
        topic_path(&self.project_name, &self.topic_name)
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub project_name: String,
    pub topic_name: String,
    pub comment: String,
}

/// Response body of CreateSubscription
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSubscriptionResponse {
    pub sub_id: String,
}

impl Action for CreateSubscriptionRequest {
    type Response = CreateSubscriptionResponse;
    const NAME: &'static str = "CreateSubscription";

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        format!(
            "{}/subscriptions",
            topic_path(&self.project_name, &self.topic_name)
        )
    }

    fn body(&self) -> Option<Value> {
        Some(json!({
            "Action": "create",
            "Comment": self.comment,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct GetSubscriptionRequest {
    pub project_name: String,
    pub topic_name: String,
    pub sub_id: String,
}

/// Response body of GetSubscription
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetSubscriptionResponse {
    pub sub_id: String,
    #[serde(default)]
    pub topic_name: String,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub state: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub create_time: u64,
    #[serde(default)]
    pub last_modify_time: u64,
}

impl Action for GetSubscriptionRequest {
    type Response = GetSubscriptionResponse;
    const NAME: &'static str = "GetSubscription";

    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        subscription_path(&self.project_name, &self.topic_name, &self.sub_id)
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSubscriptionRequest {
    pub project_name: String,
    pub topic_name: String,
    pub sub_id: String,
    pub comment: String,
}

impl Action for UpdateSubscriptionRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "UpdateSubscription";

    fn method(&self) -> Method {
        Method::PUT
    }

    fn path(&self) -> String {
        subscription_path(&self.project_name, &self.topic_name, &self.sub_id)
    }

    fn body(&self) -> Option<Value> {
        Some(json!({ "Comment": self.comment }))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteSubscriptionRequest {
    pub project_name: String,
    pub topic_name: String,
    pub sub_id: String,
}

impl Action for DeleteSubscriptionRequest {
    type Response = IgnoredAny;
    const NAME: &'static str = "DeleteSubscription";

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn path(&self) -> String {
        subscription_path(&self.project_name, &self.topic_name, &self.sub_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datahub::models::RecordSchema;

    #[test]
    fn test_paths() {
        let req = GetSubscriptionRequest {
            project_name: "p".into(),
            topic_name: "t".into(),
            sub_id: "1500000000000abcd".into(),
        };
        assert_eq!(req.path(), "/projects/p/topics/t/subscriptions/1500000000000abcd");

        let req = ListTopicsRequest {
            project_name: "p".into(),
        };
        assert_eq!(req.path(), "/projects/p/topics");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let req = GetProjectRequest {
            project_name: "a b/c".into(),
        };
        assert_eq!(req.path(), "/projects/a%20b%2Fc");
    }

    #[test]
    fn test_create_topic_body() {
        let schema = RecordSchema::from_json(r#"{"fields":[{"name":"id","type":"BIGINT"}]}"#)
            .unwrap();
        let req = CreateTopicRequest {
            topic: TopicSpec {
                project_name: "p".into(),
                topic_name: "t".into(),
                shard_count: 3,
                life_cycle: 7,
                comment: "c".into(),
                record_type: RecordType::Tuple,
                record_schema: Some(schema),
            },
        };
        let body = req.body().unwrap();
        assert_eq!(body["Action"], "create");
        assert_eq!(body["ShardCount"], 3);
        assert_eq!(body["Lifecycle"], 7);
        assert_eq!(body["RecordType"], "TUPLE");
        assert_eq!(
            body["RecordSchema"],
            r#"{"fields":[{"name":"id","type":"BIGINT"}]}"#
        );
    }

    #[test]
    fn test_create_blob_topic_has_no_schema() {
        let req = CreateTopicRequest {
            topic: TopicSpec {
                project_name: "p".into(),
                topic_name: "t".into(),
                shard_count: 1,
                life_cycle: 1,
                comment: String::new(),
                record_type: RecordType::Blob,
                record_schema: None,
            },
        };
        assert!(req.body().unwrap().get("RecordSchema").is_none());
    }

    #[test]
    fn test_get_topic_response_decodes() {
        let resp: GetTopicResponse = serde_json::from_value(json!({
            "ShardCount": 3,
            "Lifecycle": 7,
            "RecordType": "BLOB",
            "Comment": "hello",
            "CreateTime": 1525763481,
            "LastModifyTime": 1525763481
        }))
        .unwrap();
        assert_eq!(resp.record_type, RecordType::Blob);
        assert!(resp.record_schema.is_empty());
    }
}
