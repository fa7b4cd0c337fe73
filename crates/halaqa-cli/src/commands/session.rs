use std::path::Path;

use halaqa_core::models::{Checkpoint, Grade, RecitationSession, SessionKind, VerseRef};

use crate::commands::common::{describe_submit_status, open_service};
use crate::error::CliError;

pub fn build_session(
    student: &str,
    from: VerseRef,
    to: VerseRef,
    revision: bool,
    grade: Option<Grade>,
    notes: &[String],
) -> RecitationSession {
    let kind = if revision {
        SessionKind::Revision
    } else {
        SessionKind::Memorization
    };
    let mut session = RecitationSession::new(student.trim(), kind, Checkpoint { from, to });
    if let Some(grade) = grade {
        session = session.with_grade(grade);
    }
    for body in notes.iter().map(|note| note.trim()).filter(|note| !note.is_empty()) {
        session = session.with_note(body);
    }
    session
}

pub async fn run_session(
    session: RecitationSession,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let note_count = session.notes.len();
    let service = open_service(db_path, config_path)?;
    let recorded = service.record_session(session).await?;
    println!(
        "Recorded session {} with {note_count} note(s): {}",
        recorded.local_id,
        describe_submit_status(&recorded.status)
    );
    Ok(())
}
