//! Halaqa CLI - record attendance and recitation sessions from the terminal
//!
//! Every record is stored locally first; when the backend is unreachable it
//! waits in a sync queue until `halaqa sync` runs.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::attendance::{run_attendance, Marks};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::note::run_note;
use crate::commands::session::{build_session, run_session};
use crate::commands::sync::{run_sync, run_sync_discard, run_sync_status};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "halaqa=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;
    let config_path = resolve_config_path(cli.config)?;

    match cli.command {
        Commands::Attendance {
            class,
            date,
            present,
            absent,
            late,
            excused,
        } => {
            let marks = Marks {
                present: &present,
                absent: &absent,
                late: &late,
                excused: &excused,
            };
            run_attendance(&class, date, &marks, &db_path, &config_path).await?;
        }
        Commands::Session {
            student,
            from,
            to,
            revision,
            grade,
            notes,
        } => {
            let session = build_session(&student, from, to, revision, grade, &notes);
            run_session(session, &db_path, &config_path).await?;
        }
        Commands::Note { session_id, text } => {
            run_note(&session_id, &text, &db_path, &config_path).await?;
        }
        Commands::Sync { action } => match action {
            None => run_sync(&db_path, &config_path).await?,
            Some(SyncCommands::Status { json }) => run_sync_status(json, &db_path)?,
            Some(SyncCommands::Discard { local_id }) => {
                run_sync_discard(&local_id, &db_path, &config_path).await?;
            }
        },
    }

    Ok(())
}
