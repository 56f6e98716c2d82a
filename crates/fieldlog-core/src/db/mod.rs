//! `SQLite` persistence layer: connection, migrations, and repositories

mod connection;
pub mod migrations;
mod queue;
mod records;

pub use connection::Database;
pub use queue::{QueueRepository, SqliteQueueRepository};
pub use records::{RecordRepository, SqliteRecordRepository};
