//! User preferences kept in a small JSON file next to the database.
//!
//! Values are stored as JSON and read back through `serde`, so a key can hold any type that
//! round-trips. Reads never fail: a missing or unreadable value falls back to the built-in
//! default for the key, then to `T::default()`.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::AppError;

pub const THEME: &str = "ThemeSetting";
pub const SHOW_NOTIFICATIONS: &str = "ShowNotifications";
pub const AUTO_SAVE: &str = "AutoSave";
pub const AUTO_SAVE_INTERVAL: &str = "AutoSaveInterval";
pub const AUTO_BACKUP: &str = "AutoBackup";
pub const DATABASE_PATH: &str = "DatabasePath";
pub const TASK_VELOCITY: &str = "TaskVelocity";
pub const LAST_OPENED_TASKS: &str = "LastOpenedTasks";

fn default_value(key: &str) -> Option<Value> {
    let value = match key {
        THEME => json!("Light"),
        SHOW_NOTIFICATIONS => json!(true),
        AUTO_SAVE => json!(true),
        AUTO_SAVE_INTERVAL => json!(5),
        AUTO_BACKUP => json!(true),
        DATABASE_PATH => json!(""),
        TASK_VELOCITY => json!(1.0),
        LAST_OPENED_TASKS => json!([]),
        _ => return None,
    };
    Some(value)
}

pub struct SettingsStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Loads the file at `path`. A missing or corrupt file gives an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_file(&path) {
            Ok(Some(values)) => {
                debug!(path = %path.display(), count = values.len(), "settings loaded");
                values
            }
            Ok(None) => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Map::new()
            }
            Err(e) => {
                warn!(path = %path.display(), "settings file unreadable, using defaults: {}", e);
                Map::new()
            }
        };

        Self {
            path,
            values: RwLock::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        if let Some(value) = self.read().get(key).cloned() {
            match serde_json::from_value(value) {
                Ok(typed) => return typed,
                Err(e) => warn!(key, "stored setting has the wrong type: {}", e),
            }
        }

        default_value(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Stores `value` and writes the file. Returns `false` without touching the file when the
    /// value is unchanged.
    pub fn set<T>(&self, key: &str, value: T) -> Result<bool, AppError>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(value)?;
        {
            let mut values = self.write();
            if values.get(key) == Some(&value) {
                return Ok(false);
            }
            values.insert(key.to_string(), value);
        }
        self.save()?;
        Ok(true)
    }

    /// Drops the stored value so reads see the default again.
    pub fn reset(&self, key: &str) -> Result<(), AppError> {
        let removed = self.write().remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), AppError> {
        let encoded = serde_json::to_string_pretty(&*self.read())?;
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, encoded)?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    pub fn theme(&self) -> String {
        self.get(THEME)
    }

    pub fn set_theme(&self, theme: &str) -> Result<bool, AppError> {
        self.set(THEME, theme)
    }

    pub fn show_notifications(&self) -> bool {
        self.get(SHOW_NOTIFICATIONS)
    }

    pub fn set_show_notifications(&self, enabled: bool) -> Result<bool, AppError> {
        self.set(SHOW_NOTIFICATIONS, enabled)
    }

    pub fn auto_save(&self) -> bool {
        self.get(AUTO_SAVE)
    }

    pub fn set_auto_save(&self, enabled: bool) -> Result<bool, AppError> {
        self.set(AUTO_SAVE, enabled)
    }

    /// Minutes between automatic saves.
    pub fn auto_save_interval(&self) -> u32 {
        self.get(AUTO_SAVE_INTERVAL)
    }

    pub fn set_auto_save_interval(&self, minutes: u32) -> Result<bool, AppError> {
        self.set(AUTO_SAVE_INTERVAL, minutes)
    }

    pub fn auto_backup(&self) -> bool {
        self.get(AUTO_BACKUP)
    }

    pub fn set_auto_backup(&self, enabled: bool) -> Result<bool, AppError> {
        self.set(AUTO_BACKUP, enabled)
    }

    /// Custom database location. Empty means the configured default.
    pub fn database_path(&self) -> String {
        self.get(DATABASE_PATH)
    }

    pub fn set_database_path(&self, path: &str) -> Result<bool, AppError> {
        self.set(DATABASE_PATH, path)
    }

    pub fn task_velocity(&self) -> f64 {
        self.get(TASK_VELOCITY)
    }

    pub fn set_task_velocity(&self, velocity: f64) -> Result<bool, AppError> {
        self.set(TASK_VELOCITY, velocity)
    }

    pub fn last_opened_tasks(&self) -> Vec<i64> {
        self.get(LAST_OPENED_TASKS)
    }

    pub fn set_last_opened_tasks(&self, task_ids: &[i64]) -> Result<bool, AppError> {
        self.set(LAST_OPENED_TASKS, task_ids)
    }

    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.values.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.values.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_file(path: &Path) -> Result<Option<Map<String, Value>>, AppError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}
