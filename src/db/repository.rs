use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use tracing::debug;

use crate::db::Store;
use crate::error::AppError;
use crate::services::session::UserContext;

/// Data access for one entity table, scoped to whoever is signed in.
///
/// Reads and deletes come with default implementations that filter on `OWNER_COLUMN`;
/// inserts and updates are per entity because their column sets differ.
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;

    const TABLE: &'static str;
    const OWNER_COLUMN: &'static str = "user_id";

    fn store(&self) -> &Store;

    fn context(&self) -> &dyn UserContext;

    fn current_user_id(&self) -> Result<i64, AppError> {
        self.context()
            .current_user_id()
            .ok_or(AppError::NotAuthenticated)
    }

    async fn fetch_all(&self) -> Result<Vec<Self::Entity>, AppError> {
        let user_id = self.current_user_id()?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY id",
            Self::TABLE,
            Self::OWNER_COLUMN
        );

        let mut conn = self.store().acquire().await?;
        let rows = sqlx::query_as::<_, Self::Entity>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<Self::Entity>, AppError> {
        let user_id = self.current_user_id()?;
        let sql = format!(
            "SELECT * FROM {} WHERE id = ? AND {} = ?",
            Self::TABLE,
            Self::OWNER_COLUMN
        );

        let mut conn = self.store().acquire().await?;
        let row = sqlx::query_as::<_, Self::Entity>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Persists a new entity, writes the generated id back into it and returns that id.
    async fn insert(&self, entity: &mut Self::Entity) -> Result<i64, AppError>;

    /// Returns `false` when no row owned by the current user matched.
    async fn update(&self, entity: &Self::Entity) -> Result<bool, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        let sql = format!(
            "DELETE FROM {} WHERE id = ? AND {} = ?",
            Self::TABLE,
            Self::OWNER_COLUMN
        );

        let mut conn = self.store().acquire().await?;
        let affected = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        debug!(table = Self::TABLE, id, affected, "delete");
        Ok(affected > 0)
    }
}
