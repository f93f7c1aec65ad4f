use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::{debug, error, warn};

use crate::db::{Repository, Store};
use crate::error::AppError;
use crate::models::{SubTask, Task, TaskStatus};
use crate::services::session::UserContext;

/// Tasks together with their sub-tasks and tag links.
///
/// A task is always read with its children, and every write that touches children runs in one
/// transaction, so a half-written task is never observable.
#[derive(Clone)]
pub struct TaskRepository {
    store: Store,
    context: Arc<dyn UserContext>,
}

impl TaskRepository {
    pub fn new(store: Store, context: Arc<dyn UserContext>) -> Self {
        Self { store, context }
    }

    pub async fn fetch_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE user_id = ?1 AND status = ?2 ORDER BY id",
        )
        .bind(user_id)
        .bind(status as i64)
        .fetch_all(&mut *conn)
        .await?;
        Ok(hydrate_all(&mut conn, tasks).await?)
    }

    pub async fn fetch_by_category(&self, category_id: i64) -> Result<Vec<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE user_id = ?1 AND category_id = ?2 ORDER BY id",
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(hydrate_all(&mut conn, tasks).await?)
    }

    pub async fn fetch_by_tag(&self, tag_id: i64) -> Result<Vec<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.*
            FROM tasks t
            INNER JOIN task_tags tt ON tt.task_id = t.id
            WHERE t.user_id = ?1 AND tt.tag_id = ?2
            ORDER BY t.id
            "#,
        )
        .bind(user_id)
        .bind(tag_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(hydrate_all(&mut conn, tasks).await?)
    }

    /// Tasks whose due date falls on `date`, ignoring the time of day.
    pub async fn fetch_due_on(&self, date: NaiveDate) -> Result<Vec<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE user_id = ?1 AND date(due_at) = date(?2) ORDER BY id",
        )
        .bind(user_id)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&mut *conn)
        .await?;
        Ok(hydrate_all(&mut conn, tasks).await?)
    }

    /// Tasks that are due or start within `[start, end]`, both ends inclusive.
    pub async fn fetch_in_period(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT * FROM tasks
            WHERE user_id = ?1
              AND ((date(due_at) BETWEEN date(?2) AND date(?3))
                OR (date(start_at) BETWEEN date(?2) AND date(?3)))
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_all(&mut *conn)
        .await?;
        Ok(hydrate_all(&mut conn, tasks).await?)
    }

    /// Changes only the status column. Used by the board's drag-and-drop, so failures are
    /// reported as `false` and logged instead of propagated.
    pub async fn update_status(&self, task_id: i64, status: TaskStatus) -> bool {
        if task_id <= 0 {
            warn!(task_id, "refusing status update for invalid task id");
            return false;
        }

        match self.try_update_status(task_id, status).await {
            Ok(updated) => updated,
            Err(e) => {
                error!(task_id, ?status, "failed to update task status: {}", e);
                false
            }
        }
    }

    async fn try_update_status(&self, task_id: i64, status: TaskStatus) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = ?1 AND user_id = ?2")
                .bind(task_id)
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
        if exists == 0 {
            warn!(task_id, "task not found for status update");
            return Ok(false);
        }

        debug!(task_id, ?status, "updating task status");
        let affected = sqlx::query("UPDATE tasks SET status = ?1 WHERE id = ?2 AND user_id = ?3")
            .bind(status as i64)
            .bind(task_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    /// Marks one sub-task done or not done. Returns the id of the task it belongs to, or
    /// `None` when the sub-task does not exist or is not the user's.
    pub async fn update_sub_task_completion(
        &self,
        sub_task_id: i64,
        is_completed: bool,
    ) -> Result<Option<i64>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let task_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sub_tasks SET is_completed = ?1
            WHERE id = ?2
              AND task_id IN (SELECT id FROM tasks WHERE user_id = ?3)
            RETURNING task_id
            "#,
        )
        .bind(is_completed)
        .bind(sub_task_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(task_id)
    }
}

#[async_trait]
impl Repository for TaskRepository {
    type Entity = Task;

    const TABLE: &'static str = "tasks";

    fn store(&self) -> &Store {
        &self.store
    }

    fn context(&self) -> &dyn UserContext {
        self.context.as_ref()
    }

    async fn fetch_all(&self) -> Result<Vec<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE user_id = ?1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(hydrate_all(&mut conn, tasks).await?)
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<Task>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

        match task {
            Some(mut task) => {
                hydrate(&mut conn, &mut task).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, entity: &mut Task) -> Result<i64, AppError> {
        let user_id = self.current_user_id()?;
        let mut tx = self.store.begin().await?;

        match insert_task(&mut tx, entity, user_id).await {
            Ok((task_id, sub_task_ids)) => {
                tx.commit().await?;

                entity.id = task_id;
                entity.user_id = user_id;
                for (sub_task, id) in entity.sub_tasks.iter_mut().zip(sub_task_ids) {
                    sub_task.id = id;
                    sub_task.task_id = task_id;
                }
                debug!(task_id, "inserted task");
                Ok(task_id)
            }
            Err(e) => {
                error!(title = %entity.title, "error inserting task, rolling back: {}", e);
                if let Err(rollback) = tx.rollback().await {
                    warn!("rollback failed: {}", rollback);
                }
                Err(e.into())
            }
        }
    }

    async fn update(&self, entity: &Task) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        let mut tx = self.store.begin().await?;

        match update_task(&mut tx, entity, user_id).await {
            Ok(true) => {
                tx.commit().await?;
                debug!(task_id = entity.id, "updated task");
                Ok(true)
            }
            Ok(false) => {
                tx.rollback().await?;
                Ok(false)
            }
            Err(e) => {
                error!(task_id = entity.id, "error updating task, rolling back: {}", e);
                if let Err(rollback) = tx.rollback().await {
                    warn!("rollback failed: {}", rollback);
                }
                Err(e.into())
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        let mut tx = self.store.begin().await?;

        match delete_task(&mut tx, id, user_id).await {
            Ok(removed) => {
                tx.commit().await?;
                debug!(task_id = id, removed, "delete task");
                Ok(removed)
            }
            Err(e) => {
                error!(task_id = id, "error deleting task, rolling back: {}", e);
                if let Err(rollback) = tx.rollback().await {
                    warn!("rollback failed: {}", rollback);
                }
                Err(e.into())
            }
        }
    }
}

async fn hydrate(conn: &mut SqliteConnection, task: &mut Task) -> Result<(), sqlx::Error> {
    task.sub_tasks = sqlx::query_as::<_, SubTask>(
        "SELECT * FROM sub_tasks WHERE task_id = ?1 ORDER BY display_order, id",
    )
    .bind(task.id)
    .fetch_all(&mut *conn)
    .await?;

    task.tag_ids = sqlx::query_scalar("SELECT tag_id FROM task_tags WHERE task_id = ?1 ORDER BY tag_id")
        .bind(task.id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(())
}

async fn hydrate_all(conn: &mut SqliteConnection, mut tasks: Vec<Task>) -> Result<Vec<Task>, sqlx::Error> {
    for task in tasks.iter_mut() {
        hydrate(conn, task).await?;
    }
    Ok(tasks)
}

/// Writes sub-tasks and tag links for `task_id`, returning the new sub-task ids in order.
///
/// A tag is only linked if it belongs to `user_id`, unless it is in `kept_tags`: links the
/// task already had survive even after their tag was deleted.
async fn insert_children(
    conn: &mut SqliteConnection,
    task_id: i64,
    task: &Task,
    user_id: i64,
    kept_tags: &[i64],
) -> Result<Vec<i64>, AppError> {
    let mut sub_task_ids = Vec::with_capacity(task.sub_tasks.len());
    for sub_task in &task.sub_tasks {
        let id = sqlx::query(
            r#"
            INSERT INTO sub_tasks (task_id, title, is_completed, display_order)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(task_id)
        .bind(&sub_task.title)
        .bind(sub_task.is_completed)
        .bind(sub_task.display_order)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        sub_task_ids.push(id);
    }

    for tag_id in &task.tag_ids {
        if kept_tags.contains(tag_id) {
            sqlx::query("INSERT INTO task_tags (task_id, tag_id) VALUES (?1, ?2)")
                .bind(task_id)
                .bind(tag_id)
                .execute(&mut *conn)
                .await?;
            continue;
        }

        let linked = sqlx::query(
            "INSERT INTO task_tags (task_id, tag_id) SELECT ?1, id FROM tags WHERE id = ?2 AND user_id = ?3",
        )
        .bind(task_id)
        .bind(tag_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if linked == 0 {
            return Err(AppError::Validation(format!("tag {} is not one of the user's tags", tag_id)));
        }
    }

    Ok(sub_task_ids)
}

async fn check_category(
    conn: &mut SqliteConnection,
    category_id: Option<i64>,
    user_id: i64,
) -> Result<(), AppError> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?1 AND user_id = ?2")
        .bind(category_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if owned == 0 {
        return Err(AppError::Validation(format!(
            "category {} is not one of the user's categories",
            category_id
        )));
    }
    Ok(())
}

async fn insert_task(
    conn: &mut SqliteConnection,
    task: &Task,
    user_id: i64,
) -> Result<(i64, Vec<i64>), AppError> {
    check_category(conn, task.category_id, user_id).await?;

    let task_id = sqlx::query(
        r#"
        INSERT INTO tasks
            (title, description, created_at, due_at, start_at, priority, status,
            category_id, is_recurring, recurrence_pattern, estimated_duration, user_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.created_at)
    .bind(task.due_at)
    .bind(task.start_at)
    .bind(task.priority as i64)
    .bind(task.status as i64)
    .bind(task.category_id)
    .bind(task.is_recurring)
    .bind(&task.recurrence_pattern)
    .bind(task.estimated_duration)
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let sub_task_ids = insert_children(conn, task_id, task, user_id, &[]).await?;
    Ok((task_id, sub_task_ids))
}

/// Returns `false` without touching children when the task is not the user's.
async fn update_task(conn: &mut SqliteConnection, task: &Task, user_id: i64) -> Result<bool, AppError> {
    let stored_category: Option<Option<i64>> =
        sqlx::query_scalar("SELECT category_id FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(task.id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(stored_category) = stored_category else {
        return Ok(false);
    };
    if task.category_id != stored_category {
        check_category(conn, task.category_id, user_id).await?;
    }

    let kept_tags: Vec<i64> = sqlx::query_scalar("SELECT tag_id FROM task_tags WHERE task_id = ?1")
        .bind(task.id)
        .fetch_all(&mut *conn)
        .await?;

    let affected = sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?1,
            description = ?2,
            due_at = ?3,
            start_at = ?4,
            priority = ?5,
            status = ?6,
            category_id = ?7,
            is_recurring = ?8,
            recurrence_pattern = ?9,
            estimated_duration = ?10
        WHERE id = ?11 AND user_id = ?12
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.due_at)
    .bind(task.start_at)
    .bind(task.priority as i64)
    .bind(task.status as i64)
    .bind(task.category_id)
    .bind(task.is_recurring)
    .bind(&task.recurrence_pattern)
    .bind(task.estimated_duration)
    .bind(task.id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(false);
    }

    // Children are replaced wholesale, never diffed.
    sqlx::query("DELETE FROM sub_tasks WHERE task_id = ?1")
        .bind(task.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM task_tags WHERE task_id = ?1")
        .bind(task.id)
        .execute(&mut *conn)
        .await?;
    insert_children(conn, task.id, task, user_id, &kept_tags).await?;

    Ok(true)
}

async fn delete_task(conn: &mut SqliteConnection, task_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = ?1 AND user_id = ?2")
        .bind(task_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if owned == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM sub_tasks WHERE task_id = ?1")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM task_tags WHERE task_id = ?1")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;
    let affected = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2")
        .bind(task_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_user, setup_test_db};
    use crate::db::{CategoryRepository, TagRepository};
    use crate::models::{Category, Tag, TaskPriority};
    use crate::services::session::{FixedUser, Session};
    use chrono::NaiveDateTime;

    async fn setup() -> (Store, TaskRepository, TagRepository, i64) {
        let store = setup_test_db().await;
        let user_id = create_user(&store, "ana").await;
        let context: Arc<dyn UserContext> = Arc::new(FixedUser(user_id));
        let tasks = TaskRepository::new(store.clone(), context.clone());
        let tags = TagRepository::new(store.clone(), context);
        (store, tasks, tags, user_id)
    }

    async fn new_tag(tags: &TagRepository, name: &str) -> i64 {
        tags.insert(&mut Tag::new(name, "#abcdef"))
            .await
            .expect("Failed to insert tag")
    }

    async fn count(store: &Store, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(store.pool())
            .await
            .expect("Failed to count rows")
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("bad timestamp")
    }

    #[tokio::test]
    async fn test_insert_and_fetch_with_children() {
        let (_store, tasks, tags, user_id) = setup().await;
        let a = new_tag(&tags, "a").await;
        let b = new_tag(&tags, "b").await;

        let mut task = Task::new("Plan trip");
        task.description = Some("Summer".to_string());
        task.priority = TaskPriority::High;
        task.sub_tasks = vec![
            SubTask::new("Book hotel", 2),
            SubTask::new("Buy tickets", 0),
            SubTask::new("Pack", 1),
        ];
        task.tag_ids = vec![b, a];

        let id = tasks.insert(&mut task).await.expect("Failed to insert task");
        assert_eq!(task.id, id);
        assert_eq!(task.user_id, user_id);
        assert!(task.sub_tasks.iter().all(|s| s.id > 0 && s.task_id == id));

        let fetched = tasks
            .fetch_by_id(id)
            .await
            .expect("Failed to fetch task")
            .expect("Task not found");
        assert_eq!(fetched.title, "Plan trip");
        assert_eq!(fetched.priority, TaskPriority::High);
        assert_eq!(fetched.status, TaskStatus::ToDo);
        let titles: Vec<&str> = fetched.sub_tasks.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy tickets", "Pack", "Book hotel"]);
        assert_eq!(fetched.tag_ids.len(), 2);
        assert!(fetched.tag_ids.contains(&a) && fetched.tag_ids.contains(&b));
    }

    #[tokio::test]
    async fn test_failed_tag_link_rolls_back_whole_task() {
        let (store, tasks, tags, _) = setup().await;
        let a = new_tag(&tags, "a").await;

        let mut task = Task::new("Doomed");
        task.sub_tasks = vec![SubTask::new("step", 0)];
        // Same tag twice violates the task_tags primary key on the second link.
        task.tag_ids = vec![a, a];

        let result = tasks.insert(&mut task).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(task.id, 0);

        assert_eq!(count(&store, "SELECT COUNT(*) FROM tasks").await, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM sub_tasks").await, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM task_tags").await, 0);
    }

    #[tokio::test]
    async fn test_failed_sub_task_insert_rolls_back_whole_task() {
        let (store, tasks, _tags, _) = setup().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_sub_task BEFORE INSERT ON sub_tasks
            WHEN NEW.title = 'reject'
            BEGIN
                SELECT RAISE(ABORT, 'sub-task rejected');
            END
            "#,
        )
        .execute(store.pool())
        .await
        .expect("Failed to create trigger");

        let mut task = Task::new("Doomed");
        task.sub_tasks = vec![SubTask::new("fine", 0), SubTask::new("reject", 1)];

        let result = tasks.insert(&mut task).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(task.id, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM tasks").await, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM sub_tasks").await, 0);
    }

    #[tokio::test]
    async fn test_foreign_tag_or_category_is_rejected() {
        let (store, tasks, tags, _) = setup().await;
        let ana_tag = new_tag(&tags, "ana's").await;
        let mut mine = Task::new("mine");
        tasks.insert(&mut mine).await.expect("Failed to insert task");

        let bob = create_user(&store, "bob").await;
        let bob_context: Arc<dyn UserContext> = Arc::new(FixedUser(bob));
        let bob_tasks = TaskRepository::new(store.clone(), bob_context.clone());
        let bob_categories = CategoryRepository::new(store.clone(), bob_context);
        let mut bob_category = Category::new("Bob", "#000000", "none");
        bob_categories
            .insert(&mut bob_category)
            .await
            .expect("Failed to insert category");

        let mut tagged = Task::new("borrowed tag");
        tagged.tag_ids = vec![ana_tag];
        assert!(matches!(bob_tasks.insert(&mut tagged).await, Err(AppError::Validation(_))));

        let mut categorised = Task::new("borrowed category");
        categorised.category_id = Some(bob_category.id);
        assert!(matches!(tasks.insert(&mut categorised).await, Err(AppError::Validation(_))));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM tasks").await, 1);

        mine.tag_ids = vec![ana_tag];
        mine.category_id = Some(bob_category.id);
        assert!(matches!(tasks.update(&mine).await, Err(AppError::Validation(_))));
        let stored = tasks.fetch_by_id(mine.id).await.expect("Failed to fetch").expect("Task not found");
        assert_eq!(stored.category_id, None);
        assert!(stored.tag_ids.is_empty());

        assert!(bob_tasks.fetch_by_tag(ana_tag).await.expect("Failed to query").is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_links_to_deleted_tag_and_category() {
        let (store, tasks, tags, user_id) = setup().await;
        let categories = CategoryRepository::new(store.clone(), Arc::new(FixedUser(user_id)));
        let mut work = Category::new("Work", "#FF4081", "work");
        categories.insert(&mut work).await.expect("Failed to insert category");
        let old = new_tag(&tags, "old").await;

        let mut task = Task::new("Archive");
        task.category_id = Some(work.id);
        task.tag_ids = vec![old];
        tasks.insert(&mut task).await.expect("Failed to insert task");

        assert!(categories.delete(work.id).await.expect("Failed to delete category"));
        assert!(tags.delete(old).await.expect("Failed to delete tag"));

        task.title = "Archive 2025".to_string();
        assert!(tasks.update(&task).await.expect("Failed to update task"));
        let stored = tasks.fetch_by_id(task.id).await.expect("Failed to fetch").expect("Task not found");
        assert_eq!(stored.category_id, Some(work.id));
        assert_eq!(stored.tag_ids, vec![old]);
    }

    #[tokio::test]
    async fn test_status_update_touches_only_status() {
        let (_store, tasks, _tags, _) = setup().await;

        let mut task = Task::new("Write docs");
        task.description = Some("README".to_string());
        task.due_at = Some(at("2026-03-01 09:00:00"));
        task.estimated_duration = 45;
        task.sub_tasks = vec![SubTask::new("outline", 0)];
        tasks.insert(&mut task).await.expect("Failed to insert task");
        let before = tasks.fetch_by_id(task.id).await.expect("Failed to fetch").expect("Task not found");

        assert!(tasks.update_status(task.id, TaskStatus::InProgress).await);

        let after = tasks.fetch_by_id(task.id).await.expect("Failed to fetch").expect("Task not found");
        assert_eq!(after.status, TaskStatus::InProgress);
        assert_eq!(Task { status: before.status, ..after }, before);
    }

    #[tokio::test]
    async fn test_status_update_reports_false_instead_of_failing() {
        let (store, tasks, _tags, _) = setup().await;
        assert!(!tasks.update_status(0, TaskStatus::Completed).await);
        assert!(!tasks.update_status(-3, TaskStatus::Completed).await);
        assert!(!tasks.update_status(999, TaskStatus::Completed).await);

        let mut task = Task::new("mine");
        tasks.insert(&mut task).await.expect("Failed to insert task");
        let other = create_user(&store, "bob").await;
        let bobs = TaskRepository::new(store.clone(), Arc::new(FixedUser(other)));
        assert!(!bobs.update_status(task.id, TaskStatus::Completed).await);

        let signed_out = TaskRepository::new(store, Arc::new(Session::new()));
        assert!(!signed_out.update_status(task.id, TaskStatus::Completed).await);
    }

    #[tokio::test]
    async fn test_update_replaces_children() {
        let (store, tasks, tags, _) = setup().await;
        let a = new_tag(&tags, "a").await;
        let b = new_tag(&tags, "b").await;

        let mut task = Task::new("Refactor");
        task.sub_tasks = vec![SubTask::new("one", 0), SubTask::new("two", 1)];
        task.tag_ids = vec![a];
        tasks.insert(&mut task).await.expect("Failed to insert task");
        let created_at = task.created_at;

        task.title = "Refactor parser".to_string();
        task.sub_tasks = vec![SubTask::new("three", 0)];
        task.tag_ids = vec![b];
        assert!(tasks.update(&task).await.expect("Failed to update task"));

        let fetched = tasks.fetch_by_id(task.id).await.expect("Failed to fetch").expect("Task not found");
        assert_eq!(fetched.title, "Refactor parser");
        assert_eq!(fetched.created_at, created_at);
        assert_eq!(fetched.sub_tasks.len(), 1);
        assert_eq!(fetched.sub_tasks[0].title, "three");
        assert_eq!(fetched.tag_ids, vec![b]);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM sub_tasks").await, 1);

        // Clearing children is a real update, not a no-op.
        task.sub_tasks.clear();
        task.tag_ids.clear();
        assert!(tasks.update(&task).await.expect("Failed to update task"));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM sub_tasks").await, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM task_tags").await, 0);
    }

    #[tokio::test]
    async fn test_update_of_foreign_task_changes_nothing() {
        let (store, tasks, _tags, _) = setup().await;
        let mut task = Task::new("private");
        task.sub_tasks = vec![SubTask::new("keep", 0)];
        tasks.insert(&mut task).await.expect("Failed to insert task");

        let bob = create_user(&store, "bob").await;
        let bobs = TaskRepository::new(store.clone(), Arc::new(FixedUser(bob)));
        let mut hijack = task.clone();
        hijack.title = "mine now".to_string();
        hijack.sub_tasks.clear();
        assert!(!bobs.update(&hijack).await.expect("Failed to run update"));

        let fetched = tasks.fetch_by_id(task.id).await.expect("Failed to fetch").expect("Task not found");
        assert_eq!(fetched.title, "private");
        assert_eq!(fetched.sub_tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_children() {
        let (store, tasks, tags, _) = setup().await;
        let a = new_tag(&tags, "a").await;

        let mut keep = Task::new("keep");
        keep.sub_tasks = vec![SubTask::new("k", 0)];
        keep.tag_ids = vec![a];
        tasks.insert(&mut keep).await.expect("Failed to insert task");

        let mut gone = Task::new("gone");
        gone.sub_tasks = vec![SubTask::new("x", 0), SubTask::new("y", 1)];
        gone.tag_ids = vec![a];
        tasks.insert(&mut gone).await.expect("Failed to insert task");

        assert!(tasks.delete(gone.id).await.expect("Failed to delete task"));
        assert!(!tasks.delete(gone.id).await.expect("Failed to delete task"));

        assert_eq!(count(&store, "SELECT COUNT(*) FROM tasks").await, 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM sub_tasks").await, 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM task_tags").await, 1);
        assert_eq!(
            count(
                &store,
                "SELECT COUNT(*) FROM sub_tasks WHERE task_id NOT IN (SELECT id FROM tasks)"
            )
            .await,
            0
        );
    }

    #[tokio::test]
    async fn test_queries_by_status_tag_and_date() {
        let (_store, tasks, tags, _) = setup().await;
        let home = new_tag(&tags, "home").await;

        let mut a = Task::new("a");
        a.due_at = Some(at("2026-05-10 18:30:00"));
        a.tag_ids = vec![home];
        tasks.insert(&mut a).await.expect("Failed to insert task");

        let mut b = Task::new("b");
        b.status = TaskStatus::Completed;
        b.start_at = Some(at("2026-05-12 08:00:00"));
        tasks.insert(&mut b).await.expect("Failed to insert task");

        let mut c = Task::new("c");
        c.due_at = Some(at("2026-06-01 12:00:00"));
        tasks.insert(&mut c).await.expect("Failed to insert task");

        let done = tasks.fetch_by_status(TaskStatus::Completed).await.expect("Failed to query");
        assert_eq!(done.iter().map(|t| t.id).collect::<Vec<_>>(), vec![b.id]);

        let tagged = tasks.fetch_by_tag(home).await.expect("Failed to query");
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].tag_ids, vec![home]);

        let day = NaiveDate::from_ymd_opt(2026, 5, 10).expect("bad date");
        let due = tasks.fetch_due_on(day).await.expect("Failed to query");
        assert_eq!(due.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a.id]);

        let from = NaiveDate::from_ymd_opt(2026, 5, 1).expect("bad date");
        let to = NaiveDate::from_ymd_opt(2026, 5, 31).expect("bad date");
        let in_may = tasks.fetch_in_period(from, to).await.expect("Failed to query");
        assert_eq!(in_may.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_sub_task_completion() {
        let (store, tasks, _tags, _) = setup().await;
        let mut task = Task::new("Laundry");
        task.sub_tasks = vec![SubTask::new("wash", 0), SubTask::new("dry", 1)];
        tasks.insert(&mut task).await.expect("Failed to insert task");

        let wash = task.sub_tasks[0].id;
        assert_eq!(
            tasks.update_sub_task_completion(wash, true).await.expect("Failed to update"),
            Some(task.id)
        );
        assert_eq!(tasks.update_sub_task_completion(999, true).await.expect("Failed to update"), None);

        let bob = create_user(&store, "bob").await;
        let bobs = TaskRepository::new(store, Arc::new(FixedUser(bob)));
        assert_eq!(
            bobs.update_sub_task_completion(task.sub_tasks[1].id, true)
                .await
                .expect("Failed to update"),
            None
        );

        let fetched = tasks.fetch_by_id(task.id).await.expect("Failed to fetch").expect("Task not found");
        assert_eq!(fetched.completed_sub_tasks(), 1);
        assert!(fetched.sub_tasks[0].is_completed);
    }

    #[tokio::test]
    async fn test_requires_authenticated_user() {
        let store = setup_test_db().await;
        let tasks = TaskRepository::new(store, Arc::new(Session::new()));
        assert!(matches!(tasks.fetch_all().await, Err(AppError::NotAuthenticated)));
        assert!(matches!(
            tasks.insert(&mut Task::new("x")).await,
            Err(AppError::NotAuthenticated)
        ));
    }
}
