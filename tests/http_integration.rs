//! Integration tests for the Datahub client using wiremock
//!
//! These tests verify request signing, request bodies, response parsing and
//! error mapping against mocked endpoints.

use datahub_provider::datahub::auth::Credentials;
use datahub_provider::datahub::client::{DatahubApi, DatahubClient};
use datahub_provider::datahub::error::DatahubError;
use datahub_provider::datahub::models::{RecordSchema, RecordType, TopicSpec};
use datahub_provider::datahub::requests::{GetProjectRequest, ListTopicsRequest};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DatahubClient {
    DatahubClient::new(&server.uri(), Credentials::new("test-ak", "test-secret"))
        .expect("client should build")
}

/// Test module for HTTP client integration tests
mod http_client_tests {
    use super::*;

    /// Every request carries the Datahub signature headers
    #[tokio::test]
    async fn test_get_project_is_signed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/tf_project"))
            .and(header_regex("authorization", r"^DATAHUB test-ak:[A-Za-z0-9+/]+=*$"))
            .and(header("x-datahub-client-version", "1.1"))
            .and(header("content-type", "application/json"))
            .and(header_exists("date"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Comment": "owned by data team",
                "CreateTime": 1_700_000_000u64,
                "LastModifyTime": 1_700_000_100u64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let project = client(&server).get_project("tf_project").await.unwrap();

        assert_eq!(project.name, "tf_project");
        assert_eq!(project.comment, "owned by data team");
        assert_eq!(project.create_time, 1_700_000_000);
        assert_eq!(project.last_modify_time, 1_700_000_100);
    }

    /// STS tokens are forwarded as a signed header
    #[tokio::test]
    async fn test_security_token_header() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/projects/tf_project"))
            .and(header("x-datahub-security-token", "sts-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = DatahubClient::new(
            &server.uri(),
            Credentials::new("test-ak", "test-secret").with_security_token("sts-token"),
        )
        .unwrap();
        client.delete_project("tf_project").await.unwrap();
    }

    /// TUPLE topics decode their record schema
    #[tokio::test]
    async fn test_get_topic_parses_record_schema() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1x/topics/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ShardCount": 3,
                "Lifecycle": 7,
                "RecordType": "TUPLE",
                "RecordSchema": "{\"fields\":[{\"name\":\"id\",\"type\":\"BIGINT\"},{\"name\":\"msg\",\"type\":\"STRING\"}]}",
                "Comment": "topic added by terraform",
                "CreateTime": 1_700_000_000u64,
                "LastModifyTime": 1_700_000_000u64
            })))
            .mount(&server)
            .await;

        let topic = client(&server).get_topic("p1x", "t1").await.unwrap();

        assert_eq!(topic.shard_count, 3);
        assert_eq!(topic.life_cycle, 7);
        assert_eq!(topic.record_type, RecordType::Tuple);
        let schema = topic.record_schema.as_ref().unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[1].name, "msg");
    }

    /// Create sends the action marker and the schema as a JSON string
    #[tokio::test]
    async fn test_create_topic_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/projects/p1x/topics/t1"))
            .and(body_partial_json(json!({
                "Action": "create",
                "ShardCount": 3,
                "Lifecycle": 7,
                "RecordType": "TUPLE",
                "RecordSchema": "{\"fields\":[{\"name\":\"id\",\"type\":\"BIGINT\"}]}"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let spec = TopicSpec {
            project_name: "p1x".into(),
            topic_name: "t1".into(),
            shard_count: 3,
            life_cycle: 7,
            comment: "topic added by terraform".into(),
            record_type: RecordType::Tuple,
            record_schema: Some(
                RecordSchema::from_json(r#"{"fields":[{"name":"id","type":"BIGINT"}]}"#).unwrap(),
            ),
        };
        client(&server).create_topic(&spec).await.unwrap();
    }

    /// Subscription creation returns the assigned id
    #[tokio::test]
    async fn test_create_subscription_returns_sub_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/projects/p1x/topics/t1/subscriptions"))
            .and(body_partial_json(json!({ "Action": "create", "Comment": "c" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "SubId": "1700000000000aB3xY" })),
            )
            .mount(&server)
            .await;

        let sub_id = client(&server)
            .create_subscription("p1x", "t1", "c")
            .await
            .unwrap();
        assert_eq!(sub_id, "1700000000000aB3xY");
    }

    /// Error documents keep their code and request id
    #[tokio::test]
    async fn test_not_found_maps_to_typed_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1x/topics/gone"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("x-datahub-request-id", "req-123")
                    .set_body_json(json!({
                        "ErrorCode": "NoSuchTopic",
                        "ErrorMessage": "The specified topic name does not exist."
                    })),
            )
            .mount(&server)
            .await;

        let err = client(&server).get_topic("p1x", "gone").await.unwrap_err();

        assert!(err.is_not_found());
        match err {
            DatahubError::Api {
                status,
                code,
                request_id,
                ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NoSuchTopic");
                assert_eq!(request_id, "req-123");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    /// Non-JSON error bodies still produce an API error with the status
    #[tokio::test]
    async fn test_server_error_without_document() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1x"))
            .respond_with(ResponseTemplate::new(503).set_body_string("<html>busy</html>"))
            .mount(&server)
            .await;

        let err = client(&server).get_project("p1x").await.unwrap_err();

        assert!(!err.is_not_found());
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.code(), Some("Http503"));
    }

    /// Listing returns topic names
    #[tokio::test]
    async fn test_list_topics_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1x/topics"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "TopicNames": ["a", "b"] })),
            )
            .mount(&server)
            .await;

        let topics = client(&server).list_topics("p1x").await.unwrap();
        assert_eq!(topics, vec!["a".to_string(), "b".to_string()]);
    }
}

/// The queued and callback variants share the blocking path
mod async_variant_tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_yields_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1x/topics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "TopicNames": ["t1"] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let rx = client.do_action_queued(ListTopicsRequest {
            project_name: "p1x".into(),
        });

        let response = rx.await.expect("task should report").unwrap();
        assert_eq!(response.topic_names, vec!["t1".to_string()]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_callback_receives_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "ErrorCode": "NoSuchProject",
                "ErrorMessage": "The specified project name does not exist."
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let done = client.do_action_with_callback(
            GetProjectRequest {
                project_name: "gone".into(),
            },
            move |result| {
                let _ = tx.send(result.map(|r| r.comment));
            },
        );

        assert!(done.await.unwrap());
        let result = rx.await.unwrap();
        assert!(result.unwrap_err().is_not_found());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_many_queued_calls_complete() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Comment": "c" })))
            .expect(20)
            .mount(&server)
            .await;

        let client = client(&server);
        let receivers: Vec<_> = (0..20)
            .map(|_| {
                client.do_action_queued(GetProjectRequest {
                    project_name: "p1x".into(),
                })
            })
            .collect();

        let results = futures::future::join_all(receivers).await;
        assert!(results.into_iter().all(|r| matches!(r, Ok(Ok(_)))));
        client.shutdown().await;
    }
}
