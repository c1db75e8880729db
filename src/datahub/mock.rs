//! In-memory Datahub
//!
//! Implements [`DatahubApi`] without a network. Tests use it to drive the
//! resource handlers, inject scripted failures and count calls.

use super::client::DatahubApi;
use super::error::{DatahubError, Result};
use super::models::{Project, Subscription, SubscriptionState, Topic, TopicSpec};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// First timestamp handed out by the mock clock
const CLOCK_START: u64 = 1_700_000_000;

#[derive(Default)]
struct MockState {
    projects: BTreeMap<String, Project>,
    topics: BTreeMap<(String, String), Topic>,
    subscriptions: BTreeMap<(String, String, String), Subscription>,
    clock: u64,
    next_sub: u64,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, VecDeque<DatahubError>>,
}

impl MockState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        CLOCK_START + self.clock
    }
}

/// In-memory Datahub service
#[derive(Default)]
pub struct MockDatahub {
    state: Mutex<MockState>,
}

fn no_such_project(project: &str) -> DatahubError {
    DatahubError::api(
        404,
        "NoSuchProject",
        format!("The specified project {} does not exist.", project),
    )
}

fn no_such_topic(project: &str, topic: &str) -> DatahubError {
    DatahubError::api(
        404,
        "NoSuchTopic",
        format!("The specified topic {}/{} does not exist.", project, topic),
    )
}

fn no_such_subscription(sub_id: &str) -> DatahubError {
    DatahubError::api(
        404,
        "NoSuchSubscription",
        format!("The specified subscription {} does not exist.", sub_id),
    )
}

impl MockDatahub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from later assertions
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call and pop the next scripted failure for it
    fn enter(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if let Some(err) = state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }

    /// Make the next call of `op` fail with `error`
    ///
    /// `op` is the trait method name, e.g. `"delete_topic"`. Failures queue
    /// up and are consumed in order.
    pub fn fail_next(&self, op: &'static str, error: DatahubError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Make the next `times` calls of `op` fail with an API error `code`
    pub fn fail_times(&self, op: &'static str, times: usize, code: &str) {
        for _ in 0..times {
            self.fail_next(op, DatahubError::api(400, code, "injected failure"));
        }
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn has_topic(&self, project: &str, topic: &str) -> bool {
        self.lock()
            .topics
            .contains_key(&(project.to_string(), topic.to_string()))
    }

    /// Drop a topic behind the provider's back
    pub fn remove_topic(&self, project: &str, topic: &str) {
        self.lock()
            .topics
            .remove(&(project.to_string(), topic.to_string()));
    }

    /// Drop a project behind the provider's back
    pub fn remove_project(&self, project: &str) {
        self.lock().projects.remove(project);
    }

    /// Seed a project without going through `create_project`
    pub fn insert_project(&self, name: &str, comment: &str) {
        let mut state = self.lock();
        let now = state.tick();
        state.projects.insert(
            name.to_string(),
            Project {
                name: name.to_string(),
                comment: comment.to_string(),
                create_time: now,
                last_modify_time: now,
            },
        );
    }
}

#[async_trait]
impl DatahubApi for MockDatahub {
    async fn create_project(&self, project_name: &str, comment: &str) -> Result<()> {
        let mut state = self.enter("create_project")?;
        if state.projects.contains_key(project_name) {
            return Err(DatahubError::api(
                409,
                "ProjectAlreadyExist",
                format!("The project {} already exists.", project_name),
            ));
        }
        let now = state.tick();
        state.projects.insert(
            project_name.to_string(),
            Project {
                name: project_name.to_string(),
                comment: comment.to_string(),
                create_time: now,
                last_modify_time: now,
            },
        );
        Ok(())
    }

    async fn get_project(&self, project_name: &str) -> Result<Project> {
        let state = self.enter("get_project")?;
        state
            .projects
            .get(project_name)
            .cloned()
            .ok_or_else(|| no_such_project(project_name))
    }

    async fn update_project(&self, project_name: &str, comment: &str) -> Result<()> {
        let mut state = self.enter("update_project")?;
        let now = state.tick();
        let project = state
            .projects
            .get_mut(project_name)
            .ok_or_else(|| no_such_project(project_name))?;
        project.comment = comment.to_string();
        project.last_modify_time = now;
        Ok(())
    }

    async fn delete_project(&self, project_name: &str) -> Result<()> {
        let mut state = self.enter("delete_project")?;
        if state.topics.keys().any(|(p, _)| p == project_name) {
            return Err(DatahubError::api(
                400,
                "InvalidStatus",
                format!("The project {} is not empty.", project_name),
            ));
        }
        state
            .projects
            .remove(project_name)
            .map(drop)
            .ok_or_else(|| no_such_project(project_name))
    }

    async fn list_topics(&self, project_name: &str) -> Result<Vec<String>> {
        let state = self.enter("list_topics")?;
        if !state.projects.contains_key(project_name) {
            return Err(no_such_project(project_name));
        }
        Ok(state
            .topics
            .keys()
            .filter(|(p, _)| p == project_name)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn create_topic(&self, topic: &TopicSpec) -> Result<()> {
        let mut state = self.enter("create_topic")?;
        if !state.projects.contains_key(&topic.project_name) {
            return Err(no_such_project(&topic.project_name));
        }
        let key = (topic.project_name.clone(), topic.topic_name.clone());
        if state.topics.contains_key(&key) {
            return Err(DatahubError::api(
                409,
                "TopicAlreadyExist",
                format!("The topic {} already exists.", topic.topic_name),
            ));
        }
        let now = state.tick();
        state.topics.insert(
            key,
            Topic {
                project_name: topic.project_name.clone(),
                topic_name: topic.topic_name.clone(),
                shard_count: topic.shard_count,
                life_cycle: topic.life_cycle,
                comment: topic.comment.clone(),
                record_type: topic.record_type,
                record_schema: topic.record_schema.clone(),
                create_time: now,
                last_modify_time: now,
            },
        );
        Ok(())
    }

    async fn get_topic(&self, project_name: &str, topic_name: &str) -> Result<Topic> {
        let state = self.enter("get_topic")?;
        state
            .topics
            .get(&(project_name.to_string(), topic_name.to_string()))
            .cloned()
            .ok_or_else(|| no_such_topic(project_name, topic_name))
    }

    async fn update_topic(
        &self,
        project_name: &str,
        topic_name: &str,
        life_cycle: u32,
        comment: &str,
    ) -> Result<()> {
        let mut state = self.enter("update_topic")?;
        let now = state.tick();
        let topic = state
            .topics
            .get_mut(&(project_name.to_string(), topic_name.to_string()))
            .ok_or_else(|| no_such_topic(project_name, topic_name))?;
        topic.life_cycle = life_cycle;
        topic.comment = comment.to_string();
        topic.last_modify_time = now;
        Ok(())
    }

    async fn delete_topic(&self, project_name: &str, topic_name: &str) -> Result<()> {
        let mut state = self.enter("delete_topic")?;
        let key = (project_name.to_string(), topic_name.to_string());
        if state.topics.remove(&key).is_none() {
            return Err(no_such_topic(project_name, topic_name));
        }
        state
            .subscriptions
            .retain(|(p, t, _), _| !(p == project_name && t == topic_name));
        Ok(())
    }

    async fn create_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        comment: &str,
    ) -> Result<String> {
        let mut state = self.enter("create_subscription")?;
        if !state
            .topics
            .contains_key(&(project_name.to_string(), topic_name.to_string()))
        {
            return Err(no_such_topic(project_name, topic_name));
        }
        let now = state.tick();
        state.next_sub += 1;
        let sub_id = format!("{}{:05}", now * 1000, state.next_sub);
        state.subscriptions.insert(
            (
                project_name.to_string(),
                topic_name.to_string(),
                sub_id.clone(),
            ),
            Subscription {
                project_name: project_name.to_string(),
                topic_name: topic_name.to_string(),
                sub_id: sub_id.clone(),
                comment: comment.to_string(),
                is_owner: true,
                state: SubscriptionState::Active,
                create_time: now,
                last_modify_time: now,
            },
        );
        Ok(sub_id)
    }

    async fn get_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
    ) -> Result<Subscription> {
        let state = self.enter("get_subscription")?;
        state
            .subscriptions
            .get(&(
                project_name.to_string(),
                topic_name.to_string(),
                sub_id.to_string(),
            ))
            .cloned()
            .ok_or_else(|| no_such_subscription(sub_id))
    }

    async fn update_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
        comment: &str,
    ) -> Result<()> {
        let mut state = self.enter("update_subscription")?;
        let now = state.tick();
        let subscription = state
            .subscriptions
            .get_mut(&(
                project_name.to_string(),
                topic_name.to_string(),
                sub_id.to_string(),
            ))
            .ok_or_else(|| no_such_subscription(sub_id))?;
        subscription.comment = comment.to_string();
        subscription.last_modify_time = now;
        Ok(())
    }

    async fn delete_subscription(
        &self,
        project_name: &str,
        topic_name: &str,
        sub_id: &str,
    ) -> Result<()> {
        let mut state = self.enter("delete_subscription")?;
        state
            .subscriptions
            .remove(&(
                project_name.to_string(),
                topic_name.to_string(),
                sub_id.to_string(),
            ))
            .map(drop)
            .ok_or_else(|| no_such_subscription(sub_id))
    }
}
