pub mod manager;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType, Repositories};
pub use sqlite::{SqliteJobDefinitionRepository, SqliteJobRepository, SqliteScheduleDefinitionRepository};
