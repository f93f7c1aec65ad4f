pub mod categories;
pub mod repository;
pub mod store;
pub mod tags;
pub mod tasks;
pub mod users;

pub use categories::CategoryRepository;
pub use repository::Repository;
pub use store::Store;
pub use tags::TagRepository;
pub use tasks::TaskRepository;
pub use users::UserRepository;
