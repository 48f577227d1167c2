//! # BMQ Common Library
//!
//! Shared code for the Ballroom Music Quiz service and tools:
//! - Score and catalog models
//! - Error type
//! - Configuration loading
//! - SQLite initialization and the score store
//! - Song catalog sources and the audio directory scanner

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use catalog::{Catalog, CatalogSource, SongRef, StyleLabel};
pub use config::QuizConfig;
pub use error::{Error, Result};
pub use models::{Difficulty, Lives, NewScore, ScoreEntry, ScoreFilter};
