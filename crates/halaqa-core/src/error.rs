//! Error types for halaqa-core

use thiserror::Error;

use crate::models::RecordKind;

/// Result type alias using halaqa-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in halaqa-core operations
///
/// Expected submission failures (offline, rejected payloads) are never
/// reported through this type; they are carried as
/// [`FailureReason`](crate::sync::FailureReason) values by the sync queue.
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A queue entry points at a record its store no longer holds
    #[error("{kind} queue references missing record {local_id}")]
    QueueCorrupted { kind: RecordKind, local_id: String },
}
