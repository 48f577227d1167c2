//! Database initialization and queries

pub mod init;
pub mod scores;
pub mod songs;

pub use init::init_database;
pub use scores::{ScoreStore, SqliteScoreStore};
