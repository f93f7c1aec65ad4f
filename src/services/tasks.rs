use std::sync::Arc;

use tracing::{info, warn};

use crate::db::{Repository, TaskRepository};
use crate::error::AppError;
use crate::models::{Task, TaskStatus};
use crate::services::events::{TaskEvent, TaskEventSink};

/// Task mutations that other views need to hear about. Each successful write is followed by
/// the matching event; failed writes publish nothing.
pub struct TaskService {
    repo: TaskRepository,
    events: Arc<dyn TaskEventSink>,
}

impl TaskService {
    pub fn new(repo: TaskRepository, events: Arc<dyn TaskEventSink>) -> Self {
        Self { repo, events }
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    pub async fn load_all(&self) -> Result<Vec<Task>, AppError> {
        self.repo.fetch_all().await
    }

    pub async fn create(&self, mut task: Task) -> Result<Task, AppError> {
        validate(&task)?;
        self.repo
            .insert(&mut task)
            .await
            .map_err(|e| e.logged("create task"))?;

        info!(task_id = task.id, "task created");
        self.events.publish(TaskEvent::Created(task.clone()));
        Ok(task)
    }

    pub async fn update(&self, task: &Task) -> Result<bool, AppError> {
        validate(task)?;
        let updated = self
            .repo
            .update(task)
            .await
            .map_err(|e| e.logged("update task"))?;
        if !updated {
            return Ok(false);
        }

        // Publish the stored copy so subscribers see the ids the children got. The write is
        // committed either way; if the copy is gone, views are told to reload instead.
        match self.repo.fetch_by_id(task.id).await {
            Ok(Some(stored)) => {
                self.events.publish(TaskEvent::Updated(stored));
            }
            Ok(None) => {
                warn!(task_id = task.id, "updated task vanished before it could be published");
                self.events.publish(TaskEvent::Reloaded);
            }
            Err(e) => {
                e.logged("reload updated task");
                self.events.publish(TaskEvent::Reloaded);
            }
        }
        Ok(true)
    }

    pub async fn delete(&self, task_id: i64) -> Result<bool, AppError> {
        let removed = self
            .repo
            .delete(task_id)
            .await
            .map_err(|e| e.logged("delete task"))?;
        if removed {
            info!(task_id, "task deleted");
            self.events.publish(TaskEvent::Deleted { task_id });
        }
        Ok(removed)
    }

    /// The board's drag-and-drop path: never fails, answers whether the move happened.
    pub async fn move_task(&self, task_id: i64, status: TaskStatus) -> bool {
        if !self.repo.update_status(task_id, status).await {
            warn!(task_id, ?status, "task move rejected");
            return false;
        }
        self.events.publish(TaskEvent::StatusChanged { task_id, status });
        true
    }

    /// Ticks a sub-task and republishes the task it belongs to.
    pub async fn set_sub_task_completed(&self, sub_task_id: i64, done: bool) -> Result<bool, AppError> {
        let Some(task_id) = self.repo.update_sub_task_completion(sub_task_id, done).await? else {
            return Ok(false);
        };
        match self.repo.fetch_by_id(task_id).await? {
            Some(task) => self.events.publish(TaskEvent::Updated(task)),
            None => self.events.publish(TaskEvent::Reloaded),
        };
        Ok(true)
    }

    /// Tells every view to reload from the store.
    pub fn reload(&self) {
        self.events.publish(TaskEvent::Reloaded);
    }
}

fn validate(task: &Task) -> Result<(), AppError> {
    if task.title.trim().is_empty() {
        return Err(AppError::Validation("task title must not be empty".to_string()));
    }
    Ok(())
}
