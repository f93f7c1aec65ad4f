use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color_hex: Option<String>,
    pub user_id: i64,
}

impl Tag {
    pub fn new(name: impl Into<String>, color_hex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_hex: Some(color_hex.into()),
            ..Default::default()
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Tag {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            color_hex: row.try_get("color_hex")?,
            user_id: row.try_get("user_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSummary {
    pub tag: Tag,
    pub task_count: i64,
}

impl<'r> FromRow<'r, SqliteRow> for TagSummary {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            tag: Tag::from_row(row)?,
            task_count: row.try_get("task_count")?,
        })
    }
}
