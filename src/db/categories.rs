use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::db::{Repository, Store};
use crate::error::AppError;
use crate::models::{Category, CategorySummary};
use crate::services::session::UserContext;

/// Name, color and icon of the categories every new store starts with.
pub const DEFAULT_CATEGORIES: [(&str, &str, &str); 5] = [
    ("Work", "#FF4081", "work"),
    ("Personal", "#4CAF50", "person"),
    ("Study", "#2196F3", "school"),
    ("Health", "#9C27B0", "favorite"),
    ("Finance", "#FF9800", "attach_money"),
];

#[derive(Clone)]
pub struct CategoryRepository {
    store: Store,
    context: Arc<dyn UserContext>,
}

impl CategoryRepository {
    pub fn new(store: Store, context: Arc<dyn UserContext>) -> Self {
        Self { store, context }
    }

    pub async fn fetch_with_task_count(&self) -> Result<Vec<CategorySummary>, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let rows = sqlx::query_as::<_, CategorySummary>(
            r#"
            SELECT c.*, COUNT(t.id) AS task_count
            FROM categories c
            LEFT JOIN tasks t ON t.category_id = c.id AND t.user_id = c.user_id
            WHERE c.user_id = ?1
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Gives `user_id` the default categories if it is the store's first account and the
    /// store has no categories at all yet, so the seed happens exactly once per database.
    /// Returns how many were inserted.
    pub async fn seed_defaults(&self, user_id: i64) -> Result<usize, AppError> {
        let mut tx = self.store.begin().await?;

        let first_account: Option<i64> = sqlx::query_scalar("SELECT MIN(id) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        if first_account != Some(user_id) {
            return Ok(0);
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        for (name, color, icon) in DEFAULT_CATEGORIES {
            sqlx::query(
                "INSERT INTO categories (name, color_hex, icon_name, user_id) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(name)
            .bind(color)
            .bind(icon)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(user_id, "seeded default categories");
        Ok(DEFAULT_CATEGORIES.len())
    }
}

#[async_trait]
impl Repository for CategoryRepository {
    type Entity = Category;

    const TABLE: &'static str = "categories";

    fn store(&self) -> &Store {
        &self.store
    }

    fn context(&self) -> &dyn UserContext {
        self.context.as_ref()
    }

    async fn insert(&self, entity: &mut Category) -> Result<i64, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO categories (name, description, color_hex, icon_name, user_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entity.name)
        .bind(&entity.description)
        .bind(&entity.color_hex)
        .bind(&entity.icon_name)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        entity.id = id;
        entity.user_id = user_id;
        Ok(id)
    }

    async fn update(&self, entity: &Category) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        let mut conn = self.store.acquire().await?;
        let affected = sqlx::query(
            r#"
            UPDATE categories
            SET name = ?1,
                description = ?2,
                color_hex = ?3,
                icon_name = ?4
            WHERE id = ?5 AND user_id = ?6
            "#,
        )
        .bind(&entity.name)
        .bind(&entity.description)
        .bind(&entity.color_hex)
        .bind(&entity.icon_name)
        .bind(entity.id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}
