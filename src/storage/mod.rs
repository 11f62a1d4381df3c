pub mod postgres;
mod rows;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{
    Storage, StorageError, StorageResult, VISIT_PRUNE_EVERY, VISIT_RETENTION_CAP,
};
