use std::path::Path;

use halaqa_core::services::DrainSummary;

use crate::commands::common::{format_status_lines, load_status, open_service, parse_local_id};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path, config_path)?;
    let summary = service.drain().await?;
    for line in format_drain_lines(&summary) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_drain_lines(summary: &DrainSummary) -> Vec<String> {
    let lines: Vec<String> = summary
        .reports()
        .iter()
        .filter(|report| report.attempted > 0 || report.remaining > 0)
        .map(|report| {
            let mut line = format!(
                "{}: {} synced, {} failed, {} remaining",
                report.kind,
                report.synced.len(),
                report.failed.len(),
                report.remaining
            );
            if !report.skipped.is_empty() {
                line.push_str(&format!(", {} waiting for their session", report.skipped.len()));
            }
            if !report.dropped.is_empty() {
                line.push_str(&format!(
                    ", {} dropped after repeated rejection",
                    report.dropped.len()
                ));
            }
            line
        })
        .collect();

    if lines.is_empty() {
        return vec!["Nothing to sync".to_string()];
    }
    lines
}

pub fn run_sync_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let report = load_status(db_path)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_discard(
    local_id: &str,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let local_id = parse_local_id(local_id)?;
    let service = open_service(db_path, config_path)?;
    let kind = service.discard(&local_id).await?;
    println!("Discarded {kind} {local_id}");
    Ok(())
}
