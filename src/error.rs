use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("User is not authenticated")]
    NotAuthenticated,

    #[error("Not found")]
    NotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error comes from bad input rather than from the store or the host.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::NotAuthenticated | AppError::NotFound | AppError::Validation(_)
        )
    }

    /// Logs the error once under the given context and hands it back for propagation.
    pub fn logged(self, context: &str) -> Self {
        if self.is_user_facing() {
            tracing::warn!(context, "{}", self);
        } else {
            error!(context, "{}", self);
        }
        self
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_user_facing() {
        assert!(AppError::Validation("empty title".into()).is_user_facing());
        assert!(AppError::NotAuthenticated.is_user_facing());
        assert!(!AppError::Internal("boom".into()).is_user_facing());
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_user_facing());
    }

    #[test]
    fn display_includes_detail() {
        let err = AppError::Config("ZENTASK_MAX_CONNECTIONS is not a number".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: ZENTASK_MAX_CONNECTIONS is not a number"
        );
    }
}
