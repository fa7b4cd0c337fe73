use std::path::Path;

use crate::commands::common::{describe_note_delivery, normalize_text, open_service};
use crate::error::CliError;

pub async fn run_note(
    session_id: &str,
    text: &[String],
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let body = normalize_text(text).ok_or(CliError::EmptyNote)?;
    let service = open_service(db_path, config_path)?;
    let (note_id, delivery) = service.add_note(session_id, &body).await?;
    println!("Added note {note_id}: {}", describe_note_delivery(&delivery));
    Ok(())
}
