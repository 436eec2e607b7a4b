//! In-memory task store with lifecycle enforcement and event fan-out.

use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;

use a2a_types::{Artifact, Message, StreamEvent, Task, TaskState, TaskStatus};

use crate::errors::{AgentError, AgentResult};

use super::{ManagedTask, TaskEvent, TaskEventBus, TaskEventReceiver};

/// Local bookkeeping attached when a task is registered.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskOptions {
    /// Task id for [`TaskManager::create`]; generated when absent.
    pub task_id: Option<String>,
    /// Context id for [`TaskManager::create`]; generated when absent.
    pub context_id: Option<String>,
    pub parent_session_id: Option<String>,
    pub description: Option<String>,
    pub agent_url: Option<String>,
    pub agent_name: Option<String>,
}

/// Criteria for [`TaskManager::cleanup`].
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Tasks untouched for longer than this are eligible.
    pub max_age: Duration,
    /// When true (the default), tasks still in flight are kept regardless
    /// of age.
    pub only_terminal: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            only_terminal: true,
        }
    }
}

/// Concurrent in-memory store of delegated tasks.
///
/// Once a task reaches a terminal state no later update changes its state;
/// such updates are silently ignored and reported as not applied.
#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: DashMap<String, ManagedTask>,
    /// parent session id -> task ids.
    session_index: DashMap<String, HashSet<String>>,
    /// context id -> task ids.
    context_index: DashMap<String, HashSet<String>>,
    events: TaskEventBus,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Registration and lookup
    // ------------------------------------------------------------------

    /// Start tracking a brand new task in the `submitted` state, allocating
    /// ids that were not supplied.
    pub fn create(&self, options: CreateTaskOptions) -> ManagedTask {
        let task = Task {
            id: options
                .task_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            context_id: options
                .context_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            status: TaskStatus::new(TaskState::Submitted),
            history: vec![],
            artifacts: vec![],
            metadata: None,
        };
        self.register(task, options)
    }

    /// Start tracking a task received from a remote agent. An existing task
    /// under the same id is replaced.
    pub fn register(&self, task: Task, options: CreateTaskOptions) -> ManagedTask {
        let now = now_ms();
        let managed = ManagedTask {
            is_active: !task.status.state.is_terminal(),
            task,
            parent_session_id: options.parent_session_id,
            description: options.description,
            created_at: now,
            updated_at: now,
            agent_url: options.agent_url,
            agent_name: options.agent_name,
        };

        if let Some(session_id) = &managed.parent_session_id {
            self.session_index
                .entry(session_id.clone())
                .or_default()
                .insert(managed.task.id.clone());
        }
        self.context_index
            .entry(managed.task.context_id.clone())
            .or_default()
            .insert(managed.task.id.clone());

        self.tasks.insert(managed.task.id.clone(), managed.clone());
        tracing::debug!(task_id = %managed.task.id, state = ?managed.task.status.state, "registered task");
        managed
    }

    pub fn get(&self, task_id: &str) -> Option<ManagedTask> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }

    pub fn list(&self) -> Vec<ManagedTask> {
        self.tasks.iter().map(|entry| entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks delegated on behalf of one local session.
    pub fn tasks_for_session(&self, session_id: &str) -> Vec<ManagedTask> {
        self.tasks_by_index(&self.session_index, session_id)
    }

    /// Tasks sharing a protocol context.
    pub fn tasks_for_context(&self, context_id: &str) -> Vec<ManagedTask> {
        self.tasks_by_index(&self.context_index, context_id)
    }

    fn tasks_by_index(&self, index: &DashMap<String, HashSet<String>>, key: &str) -> Vec<ManagedTask> {
        index
            .get(key)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Transition a task to a new state.
    ///
    /// Returns `Ok(false)` without touching the task when it is already in
    /// a terminal state.
    pub fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<Message>,
    ) -> AgentResult<bool> {
        let status = TaskStatus {
            state,
            message,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        };
        self.apply_status(task_id, status)
    }

    /// Append a message to the task history.
    pub fn add_message(&self, task_id: &str, message: Message) -> AgentResult<()> {
        {
            let mut entry = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| AgentError::task_not_found(task_id))?;
            entry.task.history.push(message.clone());
            entry.updated_at = now_ms();
        }
        self.events.publish(&TaskEvent::Message {
            task_id: task_id.to_string(),
            message,
        });
        Ok(())
    }

    /// Add an artifact, merging into an existing one when the incoming
    /// chunk asks to be appended.
    pub fn add_artifact(&self, task_id: &str, artifact: Artifact) -> AgentResult<()> {
        let merged = {
            let mut entry = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| AgentError::task_not_found(task_id))?;

            let existing = entry
                .task
                .artifacts
                .iter_mut()
                .find(|candidate| candidate.artifact_id == artifact.artifact_id);
            let merged = match existing {
                Some(existing) if artifact.append => {
                    existing.parts.extend(artifact.parts);
                    existing.last_chunk = artifact.last_chunk;
                    if artifact.name.is_some() {
                        existing.name = artifact.name;
                    }
                    existing.clone()
                }
                _ => {
                    entry.task.artifacts.push(artifact.clone());
                    artifact
                }
            };
            entry.updated_at = now_ms();
            merged
        };
        self.events.publish(&TaskEvent::Artifact {
            task_id: task_id.to_string(),
            artifact: merged,
        });
        Ok(())
    }

    /// Apply one event from an update stream or a webhook delivery.
    pub fn apply_stream_event(&self, task_id: &str, event: StreamEvent) -> AgentResult<()> {
        match event {
            StreamEvent::Task(task) => {
                self.update_from_task(task_id, task)?;
            }
            StreamEvent::StatusUpdate(update) => {
                self.apply_status(task_id, update.status)?;
            }
            StreamEvent::ArtifactUpdate(update) => {
                self.add_artifact(task_id, update.artifact)?;
            }
            StreamEvent::Message(message) => {
                self.add_message(task_id, message)?;
            }
        }
        Ok(())
    }

    /// Replace local state with a full remote snapshot.
    ///
    /// History and artifacts are replaced only when the snapshot carries
    /// them; metadata is merged key by key. Returns `Ok(false)` when the
    /// local task is already terminal.
    pub fn update_from_task(&self, task_id: &str, remote: Task) -> AgentResult<bool> {
        let events = {
            let mut entry = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| AgentError::task_not_found(task_id))?;
            if entry.task.status.state.is_terminal() {
                return Ok(false);
            }

            if !remote.history.is_empty() {
                entry.task.history = remote.history;
            }
            if !remote.artifacts.is_empty() {
                entry.task.artifacts = remote.artifacts;
            }
            if let Some(incoming) = remote.metadata {
                entry
                    .task
                    .metadata
                    .get_or_insert_with(Default::default)
                    .extend(incoming);
            }
            self.transition(&mut entry, remote.status)
        };
        for event in events {
            self.events.publish(&event);
        }
        Ok(true)
    }

    /// Cancel a task locally. Returns false when the task is unknown or
    /// already terminal.
    pub fn cancel_task(&self, task_id: &str) -> bool {
        matches!(
            self.update_status(task_id, TaskState::Canceled, None),
            Ok(true)
        )
    }

    /// Stop tracking a task. Emits no event.
    pub fn delete(&self, task_id: &str) -> bool {
        let Some((_, managed)) = self.tasks.remove(task_id) else {
            return false;
        };
        if let Some(session_id) = &managed.parent_session_id {
            prune_index(&self.session_index, session_id, task_id);
        }
        prune_index(&self.context_index, &managed.task.context_id, task_id);
        self.events.remove_task(task_id);
        true
    }

    /// Delete tasks untouched for longer than `max_age`. Returns how many
    /// were removed.
    pub fn cleanup(&self, options: CleanupOptions) -> usize {
        let cutoff = now_ms() - options.max_age.as_millis() as i64;
        let stale: Vec<String> = self
            .tasks
            .iter()
            .filter(|entry| {
                entry.updated_at < cutoff
                    && (!options.only_terminal || entry.task.status.state.is_terminal())
            })
            .map(|entry| entry.task.id.clone())
            .collect();

        let mut removed = 0;
        for task_id in stale {
            if self.delete(&task_id) {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "cleaned up stale tasks");
        }
        removed
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Listen for events of one task.
    pub fn subscribe(&self, task_id: &str) -> TaskEventReceiver {
        self.events.subscribe(task_id)
    }

    /// Listen for events of every task.
    pub fn subscribe_all(&self) -> TaskEventReceiver {
        self.events.subscribe_all()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn apply_status(&self, task_id: &str, status: TaskStatus) -> AgentResult<bool> {
        let events = {
            let mut entry = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| AgentError::task_not_found(task_id))?;
            if entry.task.status.state.is_terminal() {
                tracing::debug!(
                    task_id,
                    state = ?entry.task.status.state,
                    "ignoring update to terminal task"
                );
                return Ok(false);
            }
            self.transition(&mut entry, status)
        };
        for event in events {
            self.events.publish(&event);
        }
        Ok(true)
    }

    /// Apply a status to a task entry and produce the events to publish.
    /// The caller publishes after releasing the map entry.
    fn transition(&self, entry: &mut ManagedTask, status: TaskStatus) -> Vec<TaskEvent> {
        let task_id = entry.task.id.clone();
        entry.task.status = status.clone();
        entry.updated_at = now_ms();
        entry.is_active = !status.state.is_terminal();

        let mut events = vec![TaskEvent::Status { task_id: task_id.clone(), status: status.clone() }];
        match status.state {
            TaskState::Completed => events.push(TaskEvent::Completed { task_id }),
            TaskState::Failed => events.push(TaskEvent::Failed { task_id }),
            _ => {}
        }
        events
    }
}

fn prune_index(index: &DashMap<String, HashSet<String>>, key: &str, task_id: &str) {
    if let Some(mut ids) = index.get_mut(key) {
        ids.remove(task_id);
        if ids.is_empty() {
            drop(ids);
            index.remove(key);
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskEvent;
    use a2a_types::Part;

    fn new_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            context_id: "c1".to_string(),
            status: TaskStatus::new(TaskState::Submitted),
            history: vec![],
            artifacts: vec![],
            metadata: None,
        }
    }

    fn text_artifact(id: &str, text: &str, append: bool, last_chunk: bool) -> Artifact {
        Artifact {
            artifact_id: id.to_string(),
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
            append,
            last_chunk,
            name: None,
        }
    }

    fn manager_with_task(id: &str) -> TaskManager {
        let manager = TaskManager::new();
        manager.register(new_task(id), CreateTaskOptions::default());
        manager
    }

    #[test]
    fn terminal_state_locks_the_task() {
        let manager = manager_with_task("t1");
        assert!(manager.update_status("t1", TaskState::Completed, None).unwrap());

        // Every later transition is a no-op.
        assert!(!manager.update_status("t1", TaskState::Working, None).unwrap());
        assert!(!manager.update_from_task("t1", new_task("t1")).unwrap());
        assert!(!manager.cancel_task("t1"));

        let managed = manager.get("t1").unwrap();
        assert_eq!(managed.task.status.state, TaskState::Completed);
        assert!(!managed.is_active);
    }

    #[test]
    fn completed_event_fires_exactly_once() {
        let manager = manager_with_task("t1");
        let mut rx = manager.subscribe("t1");

        manager.update_status("t1", TaskState::Working, None).unwrap();
        manager.update_status("t1", TaskState::Completed, None).unwrap();
        manager.update_status("t1", TaskState::Completed, None).unwrap();

        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, TaskEvent::Completed { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
    }

    #[test]
    fn failed_state_emits_failed_event() {
        let manager = manager_with_task("t1");
        let mut rx = manager.subscribe("t1");
        manager.update_status("t1", TaskState::Failed, None).unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events
            .iter()
            .any(|event| matches!(event, TaskEvent::Failed { .. })));
        assert!(!manager.get("t1").unwrap().is_active);
    }

    #[test]
    fn artifact_chunks_merge_by_id() {
        let manager = manager_with_task("t1");
        manager
            .add_artifact("t1", text_artifact("a1", "Hello, ", false, false))
            .unwrap();
        manager
            .add_artifact("t1", text_artifact("a1", "world", true, true))
            .unwrap();
        // A different id never merges.
        manager
            .add_artifact("t1", text_artifact("a2", "other", false, false))
            .unwrap();

        let task = manager.get("t1").unwrap().task;
        assert_eq!(task.artifacts.len(), 2);
        assert_eq!(task.artifacts[0].parts.len(), 2);
        assert!(task.artifacts[0].last_chunk);
    }

    #[test]
    fn non_append_artifact_with_same_id_is_added_separately() {
        let manager = manager_with_task("t1");
        manager
            .add_artifact("t1", text_artifact("a1", "one", false, false))
            .unwrap();
        manager
            .add_artifact("t1", text_artifact("a1", "two", false, false))
            .unwrap();
        assert_eq!(manager.get("t1").unwrap().task.artifacts.len(), 2);
    }

    #[test]
    fn update_from_task_merges_metadata_and_replaces_history() {
        let manager = manager_with_task("t1");
        manager
            .add_message("t1", Message::user_text("first"))
            .unwrap();

        let mut remote = new_task("t1");
        remote.status = TaskStatus::new(TaskState::Working);
        remote.history = vec![Message::user_text("replacement")];
        remote.metadata = Some(
            [("agent".to_string(), serde_json::json!("researcher"))]
                .into_iter()
                .collect(),
        );
        assert!(manager.update_from_task("t1", remote).unwrap());

        // A snapshot without history keeps the local history.
        let mut bare = new_task("t1");
        bare.status = TaskStatus::new(TaskState::Working);
        bare.metadata = Some(
            [("cost".to_string(), serde_json::json!(3))]
                .into_iter()
                .collect(),
        );
        assert!(manager.update_from_task("t1", bare).unwrap());

        let task = manager.get("t1").unwrap().task;
        assert_eq!(task.history.len(), 1);
        let metadata = task.metadata.unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["agent"], serde_json::json!("researcher"));
    }

    #[test]
    fn apply_stream_event_routes_every_variant() {
        let manager = manager_with_task("t1");
        manager
            .apply_stream_event(
                "t1",
                StreamEvent::StatusUpdate(a2a_types::StatusUpdate {
                    status: TaskStatus::new(TaskState::Working),
                }),
            )
            .unwrap();
        manager
            .apply_stream_event(
                "t1",
                StreamEvent::ArtifactUpdate(a2a_types::ArtifactUpdate {
                    artifact: text_artifact("a1", "chunk", false, true),
                }),
            )
            .unwrap();
        manager
            .apply_stream_event("t1", StreamEvent::Message(Message::user_text("hi")))
            .unwrap();

        let task = manager.get("t1").unwrap().task;
        assert_eq!(task.status.state, TaskState::Working);
        assert_eq!(task.artifacts.len(), 1);
        assert_eq!(task.history.len(), 1);
    }

    #[test]
    fn create_allocates_missing_ids() {
        let manager = TaskManager::new();
        let managed = manager.create(CreateTaskOptions::default());
        assert!(!managed.task.id.is_empty());
        assert!(!managed.task.context_id.is_empty());
        assert_eq!(managed.task.status.state, TaskState::Submitted);
        assert!(managed.is_active);

        let pinned = manager.create(CreateTaskOptions {
            task_id: Some("t9".to_string()),
            context_id: Some("c9".to_string()),
            ..Default::default()
        });
        assert_eq!(pinned.task.id, "t9");
        assert_eq!(manager.tasks_for_context("c9").len(), 1);
    }

    #[test]
    fn unknown_task_is_an_error() {
        let manager = TaskManager::new();
        let err = manager
            .update_status("missing", TaskState::Working, None)
            .unwrap_err();
        assert!(matches!(err, AgentError::TaskNotFound { .. }));
    }

    #[test]
    fn session_and_context_indexes_follow_deletes() {
        let manager = TaskManager::new();
        manager.register(
            new_task("t1"),
            CreateTaskOptions {
                parent_session_id: Some("s1".to_string()),
                ..Default::default()
            },
        );
        manager.register(
            new_task("t2"),
            CreateTaskOptions {
                parent_session_id: Some("s1".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(manager.tasks_for_session("s1").len(), 2);
        assert_eq!(manager.tasks_for_context("c1").len(), 2);

        assert!(manager.delete("t1"));
        assert_eq!(manager.tasks_for_session("s1").len(), 1);
        assert_eq!(manager.tasks_for_context("c1").len(), 1);
        assert!(!manager.delete("t1"));
    }

    #[test]
    fn delete_emits_no_event() {
        let manager = manager_with_task("t1");
        let mut rx = manager.subscribe_all();
        manager.delete("t1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cleanup_respects_age_and_terminal_gate() {
        let manager = manager_with_task("t1");
        manager.register(new_task("t2"), CreateTaskOptions::default());
        manager.update_status("t1", TaskState::Completed, None).unwrap();

        // Nothing is old enough yet.
        assert_eq!(manager.cleanup(CleanupOptions::default()), 0);

        // With a zero age only the terminal task goes.
        let aggressive = CleanupOptions {
            max_age: Duration::ZERO,
            only_terminal: true,
        };
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(manager.cleanup(aggressive), 1);
        assert!(manager.get("t1").is_none());
        assert!(manager.get("t2").is_some());

        // Dropping the gate removes in-flight tasks too.
        std::thread::sleep(Duration::from_millis(5));
        let everything = CleanupOptions {
            max_age: Duration::ZERO,
            only_terminal: false,
        };
        assert_eq!(manager.cleanup(everything), 1);
        assert!(manager.is_empty());
    }
}
