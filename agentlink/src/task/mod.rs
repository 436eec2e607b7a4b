//! Local task lifecycle tracking.
//!
//! [`TaskManager`] owns an in-memory store of delegated tasks, enforces the
//! terminal-state invariant and fans task events out to listeners.

mod event_bus;
mod manager;

pub use event_bus::{TaskEventBus, TaskEventReceiver};
pub use manager::{CleanupOptions, CreateTaskOptions, TaskManager};

use a2a_types::{Artifact, Message, Task, TaskStatus};

/// A tracked task plus local bookkeeping that never goes on the wire.
#[derive(Debug, Clone)]
pub struct ManagedTask {
    pub task: Task,
    /// Groups tasks delegated on behalf of one local session.
    pub parent_session_id: Option<String>,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds of the last mutation.
    pub updated_at: i64,
    /// Where the task was delegated to, when known.
    pub agent_url: Option<String>,
    pub agent_name: Option<String>,
    /// False once the task reaches a terminal state.
    pub is_active: bool,
}

/// A change notification emitted by the [`TaskManager`].
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// The task's status changed.
    Status { task_id: String, status: TaskStatus },
    /// An artifact was added or merged.
    Artifact { task_id: String, artifact: Artifact },
    /// A message was appended to the history.
    Message { task_id: String, message: Message },
    /// The task reached `completed`.
    Completed { task_id: String },
    /// The task reached `failed`.
    Failed { task_id: String },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Status { task_id, .. }
            | TaskEvent::Artifact { task_id, .. }
            | TaskEvent::Message { task_id, .. }
            | TaskEvent::Completed { task_id }
            | TaskEvent::Failed { task_id } => task_id,
        }
    }
}
