use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] halaqa_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note text provided")]
    EmptyNote,
    #[error("Attendance needs at least one student mark")]
    EmptyAttendance,
    #[error("Invalid local id: {0}")]
    InvalidLocalId(String),
    #[error("Could not resolve the {0} directory; pass --db-path or --config")]
    MissingDirectory(&'static str),
    #[error(
        "Sync is not configured. Set api_base_url in the config file or export HALAQA_API_URL."
    )]
    SyncNotConfigured,
}
