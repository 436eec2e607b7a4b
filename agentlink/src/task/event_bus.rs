//! Fan-out of task events to per-task and global listeners.

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::TaskEvent;

/// Receiving end of a task event subscription. Dropping it unsubscribes;
/// the dead sender is pruned on the next publish.
pub type TaskEventReceiver = mpsc::UnboundedReceiver<TaskEvent>;

#[derive(Debug, Default)]
struct Subscribers {
    senders: Vec<mpsc::UnboundedSender<TaskEvent>>,
}

impl Subscribers {
    fn add(&mut self) -> TaskEventReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.push(sender);
        receiver
    }

    /// Deliver to every live listener. A listener that went away never
    /// affects delivery to the others.
    fn broadcast(&mut self, event: &TaskEvent) {
        self.senders.retain(|sender| {
            let delivered = sender.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!(task_id = event.task_id(), "pruning dropped task listener");
            }
            delivered
        });
    }

    fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Event distribution hub for the task manager.
#[derive(Debug, Default)]
pub struct TaskEventBus {
    per_task: DashMap<String, Subscribers>,
    global: std::sync::Mutex<Subscribers>,
}

impl TaskEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for events of one task.
    pub fn subscribe(&self, task_id: &str) -> TaskEventReceiver {
        self.per_task.entry(task_id.to_string()).or_default().add()
    }

    /// Listen for events of every task.
    pub fn subscribe_all(&self) -> TaskEventReceiver {
        self.global
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .add()
    }

    /// Publish to the task's listeners and to global listeners.
    pub fn publish(&self, event: &TaskEvent) {
        if let Some(mut subscribers) = self.per_task.get_mut(event.task_id()) {
            subscribers.broadcast(event);
        }
        self.global
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .broadcast(event);
    }

    /// Drop subscription state for a task that no longer exists.
    pub fn remove_task(&self, task_id: &str) {
        self.per_task.remove(task_id);
    }

    /// Prune per-task entries whose listeners have all gone away.
    pub fn prune(&self) {
        self.per_task.retain(|_, subscribers| {
            subscribers.senders.retain(|sender| !sender.is_closed());
            !subscribers.is_empty()
        });
    }
}
