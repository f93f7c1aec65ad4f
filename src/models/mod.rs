pub mod category;
pub mod tag;
pub mod task;
pub mod user;

pub use category::{Category, CategorySummary};
pub use tag::{Tag, TagSummary};
pub use task::{SubTask, Task, TaskPriority, TaskStatus};
pub use user::User;

use chrono::{NaiveDateTime, Timelike};

/// Local wall-clock time truncated to whole seconds, the resolution timestamps are kept at.
pub fn now() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
