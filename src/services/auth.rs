use std::sync::Arc;

use tracing::{error, info, warn};

use crate::db::{CategoryRepository, Store, UserRepository};
use crate::error::AppError;
use crate::models::User;
use crate::models::user::DEFAULT_THEME;
use crate::services::password;
use crate::services::session::Session;

/// Registration, login and the current-user session.
///
/// The public operations answer with `bool` and never propagate errors: bad input, duplicate
/// accounts and wrong passwords are ordinary outcomes, and store failures are logged here.
pub struct AuthService {
    users: UserRepository,
    categories: CategoryRepository,
    session: Arc<Session>,
}

impl AuthService {
    pub fn new(store: Store, session: Arc<Session>) -> Self {
        Self {
            users: UserRepository::new(store.clone(), session.clone()),
            categories: CategoryRepository::new(store, session.clone()),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> bool {
        match self
            .try_register(username, email, password, first_name, last_name)
            .await
        {
            Ok(registered) => registered,
            Err(e) => {
                error!(username, "registration failed: {}", e);
                false
            }
        }
    }

    async fn try_register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, AppError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.trim().is_empty() {
            return Ok(false);
        }

        let (by_username, by_email) = tokio::join!(
            self.users.fetch_by_username(username),
            self.users.fetch_by_email(email)
        );
        if by_username?.is_some() {
            info!(username, "username already taken");
            return Ok(false);
        }
        if by_email?.is_some() {
            info!(email, "email already registered");
            return Ok(false);
        }

        let plain = password.to_owned();
        let digest = tokio::task::spawn_blocking(move || password::hash_password(&plain)).await?;

        let now = crate::models::now();
        let mut user = User {
            id: 0,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: digest.hash,
            password_salt: digest.salt,
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
            created_at: now,
            last_login_at: now,
            profile_image_path: None,
            theme_preference: Some(DEFAULT_THEME.to_string()),
        };
        let user_id = self.users.create(&mut user).await?;
        info!(user_id, username, "registered user");

        if let Err(e) = self.categories.seed_defaults(user_id).await {
            warn!(user_id, "could not seed default categories: {}", e);
        }

        Ok(user_id > 0)
    }

    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.try_login(username, password).await {
            Ok(logged_in) => logged_in,
            Err(e) => {
                error!(username, "login failed: {}", e);
                false
            }
        }
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<bool, AppError> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Ok(false);
        }

        let Some(mut user) = self.users.fetch_by_username(username).await? else {
            info!(username, "login for unknown user");
            return Ok(false);
        };

        if !self.check_password(&user, password).await? {
            info!(username, "login with wrong password");
            return Ok(false);
        }

        self.users.update_last_login(user.id).await?;
        user.last_login_at = crate::models::now();
        info!(user_id = user.id, "user logged in");
        self.session.set(user);
        Ok(true)
    }

    pub fn logout(&self) {
        if let Some(user) = self.session.current_user() {
            info!(user_id = user.id, "user logged out");
        }
        self.session.clear();
    }

    /// Replaces the signed-in user's password after checking the current one.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> bool {
        match self.try_change_password(current_password, new_password).await {
            Ok(changed) => changed,
            Err(e) => {
                error!("password change failed: {}", e);
                false
            }
        }
    }

    async fn try_change_password(&self, current_password: &str, new_password: &str) -> Result<bool, AppError> {
        let Some(user) = self.session.current_user() else {
            return Err(AppError::NotAuthenticated);
        };
        if new_password.trim().is_empty() {
            return Ok(false);
        }
        if !self.check_password(&user, current_password).await? {
            return Ok(false);
        }

        let plain = new_password.to_owned();
        let digest = tokio::task::spawn_blocking(move || password::hash_password(&plain)).await?;
        if !self
            .users
            .update_password(user.id, &digest.hash, &digest.salt)
            .await?
        {
            return Ok(false);
        }

        self.session.update(|u| {
            u.password_hash = digest.hash;
            u.password_salt = digest.salt;
        });
        Ok(true)
    }

    pub async fn set_theme_preference(&self, theme: &str) -> Result<bool, AppError> {
        let user_id = self
            .session
            .current_user()
            .map(|u| u.id)
            .ok_or(AppError::NotAuthenticated)?;

        let updated = self.users.update_theme_preference(user_id, theme).await?;
        if updated {
            self.session
                .update(|u| u.theme_preference = Some(theme.to_string()));
        }
        Ok(updated)
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, AppError> {
        let plain = password.to_owned();
        let hash = user.password_hash.clone();
        let salt = user.password_salt.clone();
        tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash, &salt)).await?
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
