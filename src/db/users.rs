use std::sync::Arc;

use async_trait::async_trait;

use crate::db::{Repository, Store};
use crate::error::AppError;
use crate::models::User;
use crate::services::session::UserContext;

/// Accounts. The generic reads are scoped by `id`, so they only ever return the signed-in
/// user; the lookups auth needs before anyone is signed in are separate and unscoped.
#[derive(Clone)]
pub struct UserRepository {
    store: Store,
    context: Arc<dyn UserContext>,
}

impl UserRepository {
    pub fn new(store: Store, context: Arc<dyn UserContext>) -> Self {
        Self { store, context }
    }

    /// Inserts an account. Does not require a session.
    pub async fn create(&self, user: &mut User) -> Result<i64, AppError> {
        let mut conn = self.store.acquire().await?;
        let id = sqlx::query(
            r#"
            INSERT INTO users
                (username, email, password_hash, password_salt, first_name, last_name,
                created_at, last_login_at, profile_image_path, theme_preference)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at)
        .bind(user.last_login_at)
        .bind(&user.profile_image_path)
        .bind(&user.theme_preference)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        user.id = id;
        Ok(id)
    }

    pub async fn fetch_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.store.acquire().await?;
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(user)
    }

    pub async fn fetch_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.store.acquire().await?;
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(user)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let mut conn = self.store.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub async fn update_last_login(&self, user_id: i64) -> Result<bool, AppError> {
        let now = crate::models::now();
        let mut conn = self.store.acquire().await?;
        let affected = sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    pub async fn update_password(
        &self,
        user_id: i64,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<bool, AppError> {
        let mut conn = self.store.acquire().await?;
        let affected = sqlx::query(
            "UPDATE users SET password_hash = ?1, password_salt = ?2 WHERE id = ?3",
        )
        .bind(password_hash)
        .bind(password_salt)
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    pub async fn update_theme_preference(
        &self,
        user_id: i64,
        theme_preference: &str,
    ) -> Result<bool, AppError> {
        let mut conn = self.store.acquire().await?;
        let affected = sqlx::query("UPDATE users SET theme_preference = ?1 WHERE id = ?2")
            .bind(theme_preference)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait]
impl Repository for UserRepository {
    type Entity = User;

    const TABLE: &'static str = "users";
    const OWNER_COLUMN: &'static str = "id";

    fn store(&self) -> &Store {
        &self.store
    }

    fn context(&self) -> &dyn UserContext {
        self.context.as_ref()
    }

    async fn insert(&self, entity: &mut User) -> Result<i64, AppError> {
        self.create(entity).await
    }

    async fn update(&self, entity: &User) -> Result<bool, AppError> {
        let user_id = self.current_user_id()?;
        if entity.id != user_id {
            return Ok(false);
        }

        let mut conn = self.store.acquire().await?;
        let affected = sqlx::query(
            r#"
            UPDATE users
            SET username = ?1,
                email = ?2,
                password_hash = ?3,
                password_salt = ?4,
                first_name = ?5,
                last_name = ?6,
                last_login_at = ?7,
                profile_image_path = ?8,
                theme_preference = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&entity.username)
        .bind(&entity.email)
        .bind(&entity.password_hash)
        .bind(&entity.password_salt)
        .bind(&entity.first_name)
        .bind(&entity.last_name)
        .bind(entity.last_login_at)
        .bind(&entity.profile_image_path)
        .bind(&entity.theme_preference)
        .bind(entity.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_user, setup_test_db};
    use crate::services::session::FixedUser;

    #[tokio::test]
    async fn test_lookup_by_username_and_email() {
        let store = setup_test_db().await;
        let id = create_user(&store, "ana").await;

        let repo = UserRepository::new(store, Arc::new(FixedUser(id)));
        let by_name = repo
            .fetch_by_username("ana")
            .await
            .expect("Failed to query")
            .expect("User not found");
        assert_eq!(by_name.id, id);

        let by_email = repo
            .fetch_by_email("ana@example.com")
            .await
            .expect("Failed to query");
        assert!(by_email.is_some());
        assert!(repo.fetch_by_username("bob").await.expect("Failed to query").is_none());
    }

    #[tokio::test]
    async fn test_generic_reads_only_see_own_account() {
        let store = setup_test_db().await;
        let ana = create_user(&store, "ana").await;
        let bob = create_user(&store, "bob").await;

        let repo = UserRepository::new(store, Arc::new(FixedUser(ana)));
        let all = repo.fetch_all().await.expect("Failed to fetch users");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].username, "ana");
        assert!(repo.fetch_by_id(bob).await.expect("Failed to fetch").is_none());
        assert_eq!(repo.count().await.expect("Failed to count"), 2);
    }

    #[tokio::test]
    async fn test_update_theme_and_password() {
        let store = setup_test_db().await;
        let id = create_user(&store, "ana").await;
        let repo = UserRepository::new(store, Arc::new(FixedUser(id)));

        assert!(repo.update_theme_preference(id, "Dark").await.expect("Failed to update"));
        assert!(repo.update_password(id, "h2", "s2").await.expect("Failed to update"));

        let user = repo.fetch_by_id(id).await.expect("Failed to fetch").expect("User not found");
        assert_eq!(user.theme(), "Dark");
        assert_eq!(user.password_hash, "h2");
        assert_eq!(user.password_salt, "s2");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected_by_schema() {
        let store = setup_test_db().await;
        create_user(&store, "ana").await;

        let now = crate::models::now();
        let mut dup = User {
            id: 0,
            username: "ana".to_string(),
            email: "other@example.com".to_string(),
            password_hash: "h".to_string(),
            password_salt: "s".to_string(),
            first_name: None,
            last_name: None,
            created_at: now,
            last_login_at: now,
            profile_image_path: None,
            theme_preference: None,
        };
        let repo = UserRepository::new(store, Arc::new(FixedUser(1)));
        assert!(repo.create(&mut dup).await.is_err());
    }
}
