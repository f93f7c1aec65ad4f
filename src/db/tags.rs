use std::sync::Arc;

use async_trait::async_trait;

use crate::db::{Repository, Store};
use crate::error::AppError;
use crate::models::{Tag, TagSummary};
use crate::services::session::UserContext;

#[derive(Clone)]
pub struct TagRepository {
    store: Store,
    context: Arc<dyn UserContext>,
}

impl TagRepository {
    pub fn new(store: Store, context: Arc<dyn UserContext>) -> Self {
        Self { store, context }
    }

    pub async fn fetch_for_task(&self, task_id: i64) -> Result<Vec<Tag>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.*
            FROM tags t
            INNER JOIN task_tags tt ON tt.tag_id = t.id
            WHERE tt.task_id = ?1 AND t.user_id = ?2
            ORDER BY t.id
            "#,
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(tags)
    }

    pub async fn fetch_with_task_count(&self) -> Result<Vec<TagSummary>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let rows = sqlx::query_as::<_, TagSummary>(
            r#"
            SELECT t.*, COUNT(k.id) AS task_count
            FROM tags t
            LEFT JOIN task_tags tt ON tt.tag_id = t.id
            LEFT JOIN tasks k ON k.id = tt.task_id AND k.user_id = t.user_id
            WHERE t.user_id = ?1
            GROUP BY t.id
            ORDER BY t.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl Repository for TagRepository {
    type Entity = Tag;

    const TABLE: &'static str = "tags";

    fn store(&self) -> &Store {
        &self.store
    }

    fn context(&self) -> &dyn UserContext {
        self.context.as_ref()
    }

    async fn insert(&self, entity: &mut Tag) -> Result<i64, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let id = sqlx::query("INSERT INTO tags (name, color_hex, user_id) VALUES (?1, ?2, ?3)")
            .bind(&entity.name)
            .bind(&entity.color_hex)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

        entity.id = id;
        entity.user_id = user_id;
        Ok(id)
    }

    async fn update(&self, entity: &Tag) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let affected = sqlx::query(
            "UPDATE tags SET name = ?1, color_hex = ?2 WHERE id = ?3 AND user_id = ?4",
        )
        .bind(&entity.name)
        .bind(&entity.color_hex)
        .bind(entity.id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}
