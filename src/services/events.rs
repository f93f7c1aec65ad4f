//! In-process fan-out of task lifecycle events.
//!
//! Every open view holds its own receiver and patches its in-memory state from the events,
//! instead of re-reading the database after each mutation somebody else made.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{Task, TaskStatus};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Created(Task),
    Updated(Task),
    Deleted { task_id: i64 },
    StatusChanged { task_id: i64, status: TaskStatus },
    /// Views should drop their state and load everything again.
    Reloaded,
}

impl TaskEvent {
    pub fn task_id(&self) -> Option<i64> {
        match self {
            TaskEvent::Created(task) | TaskEvent::Updated(task) => Some(task.id),
            TaskEvent::Deleted { task_id } | TaskEvent::StatusChanged { task_id, .. } => Some(*task_id),
            TaskEvent::Reloaded => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Created(_) => "created",
            TaskEvent::Updated(_) => "updated",
            TaskEvent::Deleted { .. } => "deleted",
            TaskEvent::StatusChanged { .. } => "status_changed",
            TaskEvent::Reloaded => "reloaded",
        }
    }
}

/// Anything task events can be published to.
pub trait TaskEventSink: Send + Sync {
    /// Returns how many subscribers the event reached.
    fn publish(&self, event: TaskEvent) -> usize;
}

/// Broadcast channel behind the sink.
///
/// `publish` never waits. Each receiver sees events in publish order; a receiver that falls
/// more than the capacity behind gets `RecvError::Lagged` and should reload.
pub struct TaskEventBus {
    tx: broadcast::Sender<TaskEvent>,
    published: AtomicU64,
}

impl TaskEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    /// Events published before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskEventSink for TaskEventBus {
    fn publish(&self, event: TaskEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(kind = event.kind(), task_id = ?event.task_id(), "publishing task event");
        self.tx.send(event).unwrap_or(0)
    }
}
