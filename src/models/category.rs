use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color_hex: Option<String>,
    pub icon_name: Option<String>,
    pub user_id: i64,
}

impl Category {
    pub fn new(name: impl Into<String>, color_hex: impl Into<String>, icon_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_hex: Some(color_hex.into()),
            icon_name: Some(icon_name.into()),
            ..Default::default()
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Category {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            color_hex: row.try_get("color_hex")?,
            icon_name: row.try_get("icon_name")?,
            user_id: row.try_get("user_id")?,
        })
    }
}

/// A category together with the number of tasks filed under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub task_count: i64,
}

impl<'r> FromRow<'r, SqliteRow> for CategorySummary {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            category: Category::from_row(row)?,
            task_count: row.try_get("task_count")?,
        })
    }
}
