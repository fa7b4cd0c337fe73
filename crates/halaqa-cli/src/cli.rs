use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use halaqa_core::models::{Grade, VerseRef};

#[derive(Parser)]
#[command(name = "halaqa")]
#[command(about = "Record Quran class attendance and recitation sessions, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a class roll call
    Attendance {
        /// Class (halaqa) identifier
        class: String,
        /// Day of the class, defaults to today
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
        /// Students present (comma separated or repeated)
        #[arg(long, value_delimiter = ',', value_name = "STUDENT")]
        present: Vec<String>,
        /// Students absent
        #[arg(long, value_delimiter = ',', value_name = "STUDENT")]
        absent: Vec<String>,
        /// Students who came late
        #[arg(long, value_delimiter = ',', value_name = "STUDENT")]
        late: Vec<String>,
        /// Students excused
        #[arg(long, value_delimiter = ',', value_name = "STUDENT")]
        excused: Vec<String>,
    },
    /// Record a recitation session
    Session {
        /// Student identifier
        student: String,
        /// First verse recited, as surah:ayah
        #[arg(long, value_name = "S:A")]
        from: VerseRef,
        /// Last verse recited, as surah:ayah
        #[arg(long, value_name = "S:A")]
        to: VerseRef,
        /// Revision of memorized portions instead of new memorization
        #[arg(long)]
        revision: bool,
        /// Grade (excellent, very-good, good, acceptable, weak)
        #[arg(long)]
        grade: Option<Grade>,
        /// Teacher note, may be repeated
        #[arg(long = "note", value_name = "TEXT")]
        notes: Vec<String>,
    },
    /// Add a note to a session
    Note {
        /// Session local id or server id
        session_id: String,
        /// Note text
        text: Vec<String>,
    },
    /// Retry queued records, or inspect the queues
    Sync {
        #[command(subcommand)]
        action: Option<SyncCommands>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show pending records per queue
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Give up on a queued record and delete it locally
    Discard {
        /// Local id of the queued record
        local_id: String,
    },
}
