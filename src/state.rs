use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{CategoryRepository, Store, TagRepository, TaskRepository, UserRepository};
use crate::error::AppError;
use crate::services::{AuthService, BoardSync, Session, TaskEventBus, TaskService};

/// Everything a front end needs, wired once. All repositories answer for whoever is signed in
/// on `session`.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub session: Arc<Session>,
    pub events: Arc<TaskEventBus>,
    pub auth: Arc<AuthService>,
    pub tasks: Arc<TaskService>,
    pub categories: Arc<CategoryRepository>,
    pub tags: Arc<TagRepository>,
    pub users: Arc<UserRepository>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        let session = Arc::new(Session::new());
        let events = Arc::new(TaskEventBus::new());

        let task_repo = TaskRepository::new(store.clone(), session.clone());
        Self {
            auth: Arc::new(AuthService::new(store.clone(), session.clone())),
            tasks: Arc::new(TaskService::new(task_repo, events.clone())),
            categories: Arc::new(CategoryRepository::new(store.clone(), session.clone())),
            tags: Arc::new(TagRepository::new(store.clone(), session.clone())),
            users: Arc::new(UserRepository::new(store.clone(), session.clone())),
            store,
            session,
            events,
        }
    }

    /// Opens the configured database, migrating it if needed.
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        let store = Store::open(config).await?;
        Ok(Self::new(store))
    }

    /// A fresh board feed. Events published before this call are not delivered to it.
    pub fn board_sync(&self) -> BoardSync {
        BoardSync::new(self.events.subscribe())
    }
}
