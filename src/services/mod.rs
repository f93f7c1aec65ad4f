pub mod auth;
pub mod board;
pub mod events;
pub mod password;
pub mod session;
pub mod tasks;

pub use auth::AuthService;
pub use board::{BoardSync, KanbanBoard};
pub use events::{TaskEvent, TaskEventBus, TaskEventSink};
pub use session::{FixedUser, Session, UserContext};
pub use tasks::TaskService;
