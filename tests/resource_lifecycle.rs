//! End-to-end resource lifecycle tests
//!
//! Drive the provider against the in-memory Datahub through create, read,
//! update, import and delete, then verify what the service holds.

use datahub_provider::datahub::mock::MockDatahub;
use datahub_provider::resource::check::{check_attr, check_destroyed, check_exists, RecordedState};
use datahub_provider::resource::retry::RetryPolicy;
use datahub_provider::resource::{Provider, ProviderError};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const PROJECT: &str = "alicloud_datahub_project";
const TOPIC: &str = "alicloud_datahub_topic";
const SUBSCRIPTION: &str = "alicloud_datahub_subscription";

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(5),
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

fn setup() -> (Arc<MockDatahub>, Provider) {
    let mock = Arc::new(MockDatahub::new());
    let provider = Provider::with_delete_retry(mock.clone(), fast_policy());
    (mock, provider)
}

fn config(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn tuple_topic(life_cycle: u32) -> Map<String, Value> {
    config(json!({
        "project_name": "tf_project",
        "topic_name": "tf_topic",
        "shard_count": 3,
        "life_cycle": life_cycle,
        "record_type": "TUPLE",
        "record_schema": "{\"fields\":[{\"name\":\"id\",\"type\":\"BIGINT\"},{\"name\":\"msg\",\"type\":\"STRING\"}]}"
    }))
}

/// Create a project and topic, recording both
async fn create_basic(provider: &Provider, life_cycle: u32) -> RecordedState {
    let mut state = RecordedState::new();

    let project = provider
        .create(PROJECT, config(json!({ "name": "tf_project" })))
        .await
        .unwrap();
    state.record("alicloud_datahub_project.basic", project);

    let topic = provider.create(TOPIC, tuple_topic(life_cycle)).await.unwrap();
    state.record("alicloud_datahub_topic.basic", topic);

    state
}

mod lifecycle_tests {
    use super::*;

    /// A fresh read matches what create recorded
    #[tokio::test]
    async fn test_create_then_read_matches() {
        let (_mock, provider) = setup();
        let state = create_basic(&provider, 7).await;

        let created = &state.get("alicloud_datahub_topic.basic").unwrap().state;
        let read = provider.read(TOPIC, &created.id).await.unwrap().unwrap();
        assert_eq!(&read, created);

        let create_time = read.attr("create_time").and_then(Value::as_str).unwrap();
        let modify_time = read.attr("last_modify_time").and_then(Value::as_str).unwrap();
        assert!(modify_time >= create_time);

        check_exists(&provider, &state, "alicloud_datahub_project.basic")
            .await
            .unwrap();
        check_exists(&provider, &state, "alicloud_datahub_topic.basic")
            .await
            .unwrap();
        check_attr(&state, "alicloud_datahub_project.basic", "comment", "project added by terraform")
            .unwrap();
        check_attr(&state, "alicloud_datahub_topic.basic", "shard_count", "3").unwrap();
        check_attr(&state, "alicloud_datahub_topic.basic", "record_type", "TUPLE").unwrap();
    }

    /// IDs are the composed names and import restores the same state
    #[tokio::test]
    async fn test_import_by_id() {
        let (_mock, provider) = setup();
        let state = create_basic(&provider, 7).await;

        let topic = &state.get("alicloud_datahub_topic.basic").unwrap().state;
        assert_eq!(topic.id, "tf_project:tf_topic");

        let imported = provider.import(TOPIC, "tf_project:tf_topic").await.unwrap();
        assert_eq!(&imported, topic);

        let err = provider.import(TOPIC, "tf_project").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidId { .. }));

        let err = provider.import(TOPIC, "tf_project:missing").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }

    /// Unsupported record types never reach the service
    #[tokio::test]
    async fn test_invalid_record_type_rejected_locally() {
        let (mock, provider) = setup();
        mock.insert_project("tf_project", "");

        let mut topic = tuple_topic(7);
        topic.insert("record_type".into(), json!("AVRO"));

        let err = provider.create(TOPIC, topic).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { ref field, .. } if field == "record_type"));
        assert_eq!(mock.calls("create_topic"), 0);
    }

    /// life_cycle changes are applied in place
    #[tokio::test]
    async fn test_update_life_cycle_in_place() {
        let (mock, provider) = setup();
        let mut state = create_basic(&provider, 7).await;
        check_attr(&state, "alicloud_datahub_topic.basic", "life_cycle", "7").unwrap();

        let prior = state.get("alicloud_datahub_topic.basic").unwrap().state.clone();
        let updated = provider
            .apply(TOPIC, Some(&prior), tuple_topic(1), false)
            .await
            .unwrap();
        state.record("alicloud_datahub_topic.basic", updated);

        check_attr(&state, "alicloud_datahub_topic.basic", "life_cycle", "1").unwrap();
        let current = &state.get("alicloud_datahub_topic.basic").unwrap().state;
        assert_eq!(current.id, prior.id);
        assert_eq!(mock.calls("update_topic"), 1);
        assert_eq!(mock.calls("create_topic"), 1);

        let unchanged = [
            "project_name",
            "topic_name",
            "shard_count",
            "record_type",
            "record_schema",
            "create_time",
        ];
        for key in unchanged {
            assert_eq!(current.attr(key), prior.attr(key), "{} changed", key);
        }

        let before = prior.attr("last_modify_time").and_then(Value::as_str).unwrap();
        let after = current.attr("last_modify_time").and_then(Value::as_str).unwrap();
        assert!(after >= before, "last_modify_time went from {} to {}", before, after);
    }

    /// Schema keys Datahub does not echo back are not a change
    #[tokio::test]
    async fn test_record_schema_with_defaults_is_stable() {
        let (mock, provider) = setup();
        mock.insert_project("tf_project", "");

        let mut topic = tuple_topic(7);
        topic.insert(
            "record_schema".into(),
            json!("{\"fields\":[{\"name\":\"id\",\"type\":\"BIGINT\",\"notnull\":false}]}"),
        );

        let created = provider.create(TOPIC, topic.clone()).await.unwrap();
        assert_eq!(
            created.attr("record_schema"),
            Some(&json!("{\"fields\":[{\"name\":\"id\",\"type\":\"BIGINT\"}]}"))
        );
        assert!(provider
            .requires_replacement(TOPIC, &created, topic.clone())
            .unwrap()
            .is_empty());

        let applied = provider.apply(TOPIC, Some(&created), topic, false).await.unwrap();
        assert_eq!(applied.id, created.id);
        assert_eq!(mock.calls("create_topic"), 1);
        assert_eq!(mock.calls("delete_topic"), 0);
    }

    /// BLOB topics refuse a record schema instead of dropping it
    #[tokio::test]
    async fn test_blob_topic_with_schema_rejected() {
        let (mock, provider) = setup();
        mock.insert_project("tf_project", "");

        let mut topic = tuple_topic(7);
        topic.insert("record_type".into(), json!("BLOB"));

        let err = provider.create(TOPIC, topic).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { ref field, .. } if field == "record_schema"));
        assert_eq!(mock.calls("create_topic"), 0);
    }

    /// Reformatting the schema is not a change; reordering it is
    #[tokio::test]
    async fn test_record_schema_changes() {
        let (_mock, provider) = setup();
        let state = create_basic(&provider, 7).await;
        let prior = &state.get("alicloud_datahub_topic.basic").unwrap().state;

        let mut pretty = tuple_topic(7);
        pretty.insert(
            "record_schema".into(),
            json!("{ \"fields\": [ {\"type\": \"BIGINT\", \"name\": \"id\"}, {\"name\": \"msg\", \"type\": \"STRING\"} ] }"),
        );
        assert!(provider
            .requires_replacement(TOPIC, prior, pretty)
            .unwrap()
            .is_empty());

        let mut reordered = tuple_topic(7);
        reordered.insert(
            "record_schema".into(),
            json!("{\"fields\":[{\"name\":\"msg\",\"type\":\"STRING\"},{\"name\":\"id\",\"type\":\"BIGINT\"}]}"),
        );
        let err = provider.update(TOPIC, prior, reordered).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequiresReplacement { ref fields, .. } if fields == &["record_schema"]));
    }

    /// Resources that vanished are dropped from state, and deleting them
    /// succeeds without a delete call
    #[tokio::test]
    async fn test_absent_resource() {
        let (mock, provider) = setup();
        let state = create_basic(&provider, 7).await;

        mock.remove_topic("tf_project", "tf_topic");
        assert_eq!(provider.read(TOPIC, "tf_project:tf_topic").await.unwrap(), None);

        provider.delete(TOPIC, "tf_project:tf_topic").await.unwrap();
        assert_eq!(mock.calls("delete_topic"), 0);
        check_destroyed(&provider, &state, TOPIC).await.unwrap();
    }

    /// Transient delete failures are retried until the delete goes through
    #[tokio::test]
    async fn test_delete_retries_auth_failures() {
        let (mock, provider) = setup();
        let state = create_basic(&provider, 7).await;

        mock.fail_times("delete_topic", 3, "AuthFailed");
        provider.delete(TOPIC, "tf_project:tf_topic").await.unwrap();

        assert_eq!(mock.calls("delete_topic"), 4);
        assert!(!mock.has_topic("tf_project", "tf_topic"));
        check_destroyed(&provider, &state, TOPIC).await.unwrap();

        provider.delete(PROJECT, "tf_project").await.unwrap();
        check_destroyed(&provider, &state, PROJECT).await.unwrap();
    }

    /// A project with topics cannot be deleted before its deadline
    #[tokio::test]
    async fn test_delete_non_empty_project_times_out() {
        let mock = Arc::new(MockDatahub::new());
        let provider = Provider::with_delete_retry(
            mock.clone(),
            RetryPolicy {
                timeout: Duration::from_millis(50),
                ..fast_policy()
            },
        );
        let state = create_basic(&provider, 7).await;

        let err = provider.delete(PROJECT, "tf_project").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        assert_eq!(
            err.datahub_error().and_then(|e| e.code()),
            Some("InvalidStatus")
        );
        check_exists(&provider, &state, "alicloud_datahub_project.basic")
            .await
            .unwrap();
    }

    /// Subscriptions get a service-assigned ID and survive a full cycle
    #[tokio::test]
    async fn test_subscription_cycle() {
        let (_mock, provider) = setup();
        let mut state = create_basic(&provider, 7).await;

        let sub = provider
            .create(
                SUBSCRIPTION,
                config(json!({ "project_name": "tf_project", "topic_name": "tf_topic" })),
            )
            .await
            .unwrap();
        let sub_id = sub.attr("sub_id").and_then(Value::as_str).unwrap().to_string();
        assert_eq!(sub.id, format!("tf_project:tf_topic:{}", sub_id));
        state.record("alicloud_datahub_subscription.basic", sub.clone());

        check_exists(&provider, &state, "alicloud_datahub_subscription.basic")
            .await
            .unwrap();
        check_attr(
            &state,
            "alicloud_datahub_subscription.basic",
            "comment",
            "subscription added by terraform",
        )
        .unwrap();

        let mut changed = config(json!({ "project_name": "tf_project", "topic_name": "tf_topic" }));
        changed.insert("comment".into(), json!("consumer for reports"));
        let updated = provider.update(SUBSCRIPTION, &sub, changed).await.unwrap();
        state.record("alicloud_datahub_subscription.basic", updated);
        check_attr(
            &state,
            "alicloud_datahub_subscription.basic",
            "comment",
            "consumer for reports",
        )
        .unwrap();

        provider.delete(SUBSCRIPTION, &sub.id).await.unwrap();
        check_destroyed(&provider, &state, SUBSCRIPTION).await.unwrap();
    }
}
