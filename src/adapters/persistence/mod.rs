//! Local storage: SQLite bookkeeping and JSON data files.

pub mod question_json;
pub mod sqlite_repo;
pub mod task_file;

pub use question_json::QuestionJson;
pub use sqlite_repo::SqliteRepo;
pub use task_file::load_static_tasks;
