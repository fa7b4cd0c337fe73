use std::path::Path;

use chrono::{Local, NaiveDate};
use halaqa_core::models::{AttendanceSheet, AttendanceStatus};

use crate::commands::common::{describe_submit_status, open_service};
use crate::error::CliError;

/// Students grouped by mark, as given on the command line
pub struct Marks<'a> {
    pub present: &'a [String],
    pub absent: &'a [String],
    pub late: &'a [String],
    pub excused: &'a [String],
}

pub fn build_sheet(
    class: &str,
    date: Option<NaiveDate>,
    marks: &Marks<'_>,
) -> Result<AttendanceSheet, CliError> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let groups = [
        (marks.present, AttendanceStatus::Present),
        (marks.absent, AttendanceStatus::Absent),
        (marks.late, AttendanceStatus::Late),
        (marks.excused, AttendanceStatus::Excused),
    ];

    let mut sheet = AttendanceSheet::new(class.trim(), date);
    for (students, status) in groups {
        for student in students.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            sheet = sheet.with_mark(student, status);
        }
    }
    if sheet.items.is_empty() {
        return Err(CliError::EmptyAttendance);
    }
    Ok(sheet)
}

pub async fn run_attendance(
    class: &str,
    date: Option<NaiveDate>,
    marks: &Marks<'_>,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let sheet = build_sheet(class, date, marks)?;
    let service = open_service(db_path, config_path)?;
    let recorded = service.record_attendance(sheet).await?;
    println!(
        "Recorded attendance {}: {}",
        recorded.local_id,
        describe_submit_status(&recorded.status)
    );
    Ok(())
}
