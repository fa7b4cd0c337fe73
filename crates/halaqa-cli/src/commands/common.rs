use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use halaqa_core::db::{Database, SqliteStoreRepository, StoreRepository};
use halaqa_core::models::{LocalId, RecordKind};
use halaqa_core::services::NoteDelivery;
use halaqa_core::sync::{QueueEntry, SubmitStatus, SyncQueue};
use halaqa_core::{PendingCounts, SyncConfig, SyncService};
use serde::Serialize;

use crate::error::CliError;

pub type HttpService = SyncService<
    halaqa_core::sync::HttpSubmitter<halaqa_core::sync::ReqwestTransport>,
>;

/// One queued record as shown by `halaqa sync status`
#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub kind: RecordKind,
    pub local_id: String,
    pub failure_reason: String,
    pub attempts: u32,
    pub last_failed_at: String,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub pending: PendingCounts,
    pub entries: Vec<QueueItem>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("HALAQA_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("halaqa").join("halaqa.db"))
        .ok_or(CliError::MissingDirectory("data"))
}

pub fn resolve_config_path(cli_config: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_config.or_else(|| env::var_os("HALAQA_CONFIG").map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("halaqa").join("config.json"))
        .ok_or(CliError::MissingDirectory("config"))
}

/// Read the config file, apply `HALAQA_*` overrides and validate
pub fn load_sync_config(config_path: &Path) -> Result<SyncConfig, CliError> {
    let config = SyncConfig::load_from_path(config_path)?.apply_env()?;
    if !config.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }
    Ok(config.validate()?)
}

pub fn open_service(db_path: &Path, config_path: &Path) -> Result<HttpService, CliError> {
    let config = load_sync_config(config_path)?;
    tracing::debug!("Using sync config {config:?}");
    let db = Database::open(db_path)?;
    Ok(SyncService::from_config(&config, Some(db))?)
}

pub fn parse_local_id(raw: &str) -> Result<LocalId, CliError> {
    raw.trim()
        .parse::<LocalId>()
        .map_err(|_| CliError::InvalidLocalId(raw.to_string()))
}

pub fn normalize_text(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn describe_submit_status(status: &SubmitStatus) -> String {
    match status {
        SubmitStatus::Synced(server_id) => format!("synced as {server_id}"),
        SubmitStatus::Queued(reason) => format!("queued for retry ({reason})"),
    }
}

pub fn describe_note_delivery(delivery: &NoteDelivery) -> String {
    match delivery {
        NoteDelivery::Submitted(status) => describe_submit_status(status),
        NoteDelivery::WithSession => "will be sent with its session".to_string(),
    }
}

/// Read the queues straight from the database; no network config needed
pub fn load_status(db_path: &Path) -> Result<StatusReport, CliError> {
    let db = Database::open(db_path)?;
    let repo = SqliteStoreRepository::new(db.connection());
    let attendance = repo.load_attendance()?;
    let sessions = repo.load_sessions()?;

    let queues = [
        (RecordKind::Session, sessions.session_queue()),
        (RecordKind::Note, sessions.note_queue()),
        (RecordKind::Attendance, attendance.queue()),
    ];
    let entries = queues
        .iter()
        .flat_map(|(kind, queue)| queue_items(*kind, queue))
        .collect();

    Ok(StatusReport {
        pending: PendingCounts {
            attendance: attendance.pending_count(),
            sessions: sessions.pending_sessions(),
            notes: sessions.pending_notes(),
        },
        entries,
    })
}

fn queue_items(kind: RecordKind, queue: &SyncQueue) -> Vec<QueueItem> {
    queue
        .iter()
        .map(|entry: &QueueEntry| QueueItem {
            kind,
            local_id: entry.local_id.to_string(),
            failure_reason: entry.failure_reason.to_string(),
            attempts: entry.attempts,
            last_failed_at: format_timestamp(entry.last_failed_at),
        })
        .collect()
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let pending = &report.pending;
    let mut lines = vec![format!(
        "Pending: {} attendance, {} session, {} note",
        pending.attendance, pending.sessions, pending.notes
    )];
    lines.extend(report.entries.iter().map(|item| {
        format!(
            "{:<10}  {}  {:<19}  attempts={}  last={}",
            item.kind.as_str(),
            item.local_id,
            item.failure_reason,
            item.attempts,
            item.last_failed_at
        )
    }));
    lines
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
