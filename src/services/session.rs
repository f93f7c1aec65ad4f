use std::sync::RwLock;

use crate::models::User;

/// Who the repositories act on behalf of.
pub trait UserContext: Send + Sync {
    fn current_user_id(&self) -> Option<i64>;
}

/// The single signed-in user of this process. Shared between the auth service, which writes it,
/// and every repository, which reads it.
#[derive(Debug, Default)]
pub struct Session {
    current: RwLock<Option<User>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }

    pub(crate) fn set(&self, user: User) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user);
    }

    pub(crate) fn clear(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub(crate) fn update<F: FnOnce(&mut User)>(&self, f: F) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(user) = guard.as_mut() {
            f(user);
        }
    }
}

impl UserContext for Session {
    fn current_user_id(&self) -> Option<i64> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|u| u.id)
    }
}

/// Fixed identity, for wiring repositories without going through login.
#[derive(Debug, Clone, Copy)]
pub struct FixedUser(pub i64);

impl UserContext for FixedUser {
    fn current_user_id(&self) -> Option<i64> {
        Some(self.0)
    }
}
