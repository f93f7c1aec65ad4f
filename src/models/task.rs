use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
    Urgent = 3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    ToDo = 0,
    InProgress = 1,
    Completed = 2,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Completed];
}

impl TryFrom<i64> for TaskPriority {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskPriority::Low),
            1 => Ok(TaskPriority::Medium),
            2 => Ok(TaskPriority::High),
            3 => Ok(TaskPriority::Urgent),
            other => Err(format!("unknown task priority {}", other)),
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskStatus::ToDo),
            1 => Ok(TaskStatus::InProgress),
            2 => Ok(TaskStatus::Completed),
            other => Err(format!("unknown task status {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub due_at: Option<NaiveDateTime>,
    pub start_at: Option<NaiveDateTime>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub category_id: Option<i64>,
    pub is_recurring: bool,
    /// Stored as given; nothing interprets it yet.
    pub recurrence_pattern: Option<String>,
    /// Minutes.
    pub estimated_duration: i64,
    pub user_id: i64,
    pub sub_tasks: Vec<SubTask>,
    pub tag_ids: Vec<i64>,
}

impl Task {
    /// A fresh, unsaved task: ToDo, Medium priority, created now.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: None,
            created_at: super::now(),
            due_at: None,
            start_at: None,
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            category_id: None,
            is_recurring: false,
            recurrence_pattern: None,
            estimated_duration: 0,
            user_id: 0,
            sub_tasks: Vec::new(),
            tag_ids: Vec::new(),
        }
    }

    pub fn completed_sub_tasks(&self) -> usize {
        self.sub_tasks.iter().filter(|s| s.is_completed).count()
    }
}

/// Maps the `tasks` row only; sub-tasks and tag ids are hydrated by the repository.
impl<'r> FromRow<'r, SqliteRow> for Task {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let priority = match row.try_get::<Option<i64>, _>("priority")? {
            Some(raw) => TaskPriority::try_from(raw).map_err(|e| sqlx::Error::ColumnDecode {
                index: "priority".to_string(),
                source: e.into(),
            })?,
            None => TaskPriority::default(),
        };
        let status = match row.try_get::<Option<i64>, _>("status")? {
            Some(raw) => TaskStatus::try_from(raw).map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: e.into(),
            })?,
            None => TaskStatus::default(),
        };

        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            due_at: row.try_get("due_at")?,
            start_at: row.try_get("start_at")?,
            priority,
            status,
            category_id: row.try_get("category_id")?,
            is_recurring: row.try_get("is_recurring")?,
            recurrence_pattern: row.try_get("recurrence_pattern")?,
            estimated_duration: row.try_get("estimated_duration")?,
            user_id: row.try_get("user_id")?,
            sub_tasks: Vec::new(),
            tag_ids: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub is_completed: bool,
    pub display_order: i64,
}

impl SubTask {
    pub fn new(title: impl Into<String>, display_order: i64) -> Self {
        Self {
            title: title.into(),
            display_order,
            ..Default::default()
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for SubTask {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            title: row.try_get("title")?,
            is_completed: row.try_get("is_completed")?,
            display_order: row.try_get("display_order")?,
        })
    }
}
