use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

pub const DEFAULT_THEME: &str = "Light";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_login_at: NaiveDateTime,
    pub profile_image_path: Option<String>,
    pub theme_preference: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn theme(&self) -> &str {
        self.theme_preference.as_deref().unwrap_or(DEFAULT_THEME)
    }
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            created_at: row.try_get("created_at")?,
            last_login_at: row.try_get("last_login_at")?,
            profile_image_path: row.try_get("profile_image_path")?,
            theme_preference: row.try_get("theme_preference")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        let now = crate::models::now();
        User {
            id: 1,
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            created_at: now,
            last_login_at: now,
            profile_image_path: None,
            theme_preference: None,
        }
    }

    #[test]
    fn full_name_trims_missing_parts() {
        assert_eq!(user(Some("Ana"), Some("Pop")).full_name(), "Ana Pop");
        assert_eq!(user(Some("Ana"), None).full_name(), "Ana");
        assert_eq!(user(None, None).full_name(), "");
    }

    #[test]
    fn theme_defaults_to_light() {
        assert_eq!(user(None, None).theme(), "Light");
    }
}
