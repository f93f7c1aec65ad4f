use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::models::{Task, TaskStatus};
use crate::services::events::TaskEvent;

/// Three-column view state kept in step with the event bus.
#[derive(Debug, Default, Clone)]
pub struct KanbanBoard {
    todo: Vec<Task>,
    in_progress: Vec<Task>,
    completed: Vec<Task>,
}

impl KanbanBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the board contents with a fresh load from the store.
    pub fn load(&mut self, tasks: Vec<Task>) {
        self.todo.clear();
        self.in_progress.clear();
        self.completed.clear();
        for task in tasks {
            self.column_mut(task.status).push(task);
        }
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::ToDo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::ToDo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Completed => &mut self.completed,
        }
    }

    pub fn find(&self, task_id: i64) -> Option<&Task> {
        TaskStatus::ALL
            .into_iter()
            .flat_map(|status| self.column(status).iter())
            .find(|task| task.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&mut self, task_id: i64) -> Option<Task> {
        for status in TaskStatus::ALL {
            let column = self.column_mut(status);
            if let Some(pos) = column.iter().position(|t| t.id == task_id) {
                return Some(column.remove(pos));
            }
        }
        None
    }

    /// Applies one event. Returns `true` when the board can no longer be patched and the
    /// owner has to reload it from the store.
    pub fn apply(&mut self, event: &TaskEvent) -> bool {
        match event {
            TaskEvent::Created(task) => {
                // A view that created the task may already show it.
                let _ = self.take(task.id);
                self.column_mut(task.status).push(task.clone());
                false
            }
            TaskEvent::Updated(task) => {
                let pos = self.column(task.status).iter().position(|t| t.id == task.id);
                match pos {
                    Some(pos) => self.column_mut(task.status)[pos] = task.clone(),
                    None => {
                        let _ = self.take(task.id);
                        self.column_mut(task.status).push(task.clone());
                    }
                }
                false
            }
            TaskEvent::Deleted { task_id } => {
                let _ = self.take(*task_id);
                false
            }
            TaskEvent::StatusChanged { task_id, status } => match self.take(*task_id) {
                Some(mut task) => {
                    task.status = *status;
                    self.column_mut(*status).push(task);
                    false
                }
                None => {
                    debug!(task_id, "status change for a task not on the board");
                    true
                }
            },
            TaskEvent::Reloaded => true,
        }
    }
}

/// Feeds a board from a bus receiver.
pub struct BoardSync {
    rx: broadcast::Receiver<TaskEvent>,
}

impl BoardSync {
    pub fn new(rx: broadcast::Receiver<TaskEvent>) -> Self {
        Self { rx }
    }

    /// Applies every event already queued without waiting. Returns `true` if the board needs
    /// a reload, either because an event asked for one or because events were missed.
    pub fn drain(&mut self, board: &mut KanbanBoard) -> bool {
        let mut needs_reload = false;
        loop {
            match self.rx.try_recv() {
                Ok(event) => needs_reload |= board.apply(&event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "board fell behind the event bus");
                    needs_reload = true;
                }
                Err(_) => return needs_reload,
            }
        }
    }

    /// Waits for the next event and applies it. `None` once the bus is gone.
    pub async fn next(&mut self, board: &mut KanbanBoard) -> Option<bool> {
        match self.rx.recv().await {
            Ok(event) => Some(board.apply(&event)),
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "board fell behind the event bus");
                Some(true)
            }
            Err(RecvError::Closed) => None,
        }
    }
}
