//! Error types for Meta Achiever

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaAchieverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Steam API error: {0}")]
    SteamApi(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("A library sync is already running for user {0}")]
    SyncInProgress(i64),

    /// The last batch failed to commit. `failed_batches` lists every batch
    /// that rolled back during the run, the last one included.
    #[error("Sync stopped after committing {committed_games} games: {}", .failed_batches.join("; "))]
    PartialSync {
        committed_games: usize,
        failed_batches: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, MetaAchieverError>;
