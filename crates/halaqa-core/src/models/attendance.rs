//! Attendance sheet model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Payload, RecordKind};

/// Attendance mark for one student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceItem {
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// One class roll call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSheet {
    /// Class (halaqa) the roll call belongs to
    pub class_id: String,
    /// Day the class met
    pub date: NaiveDate,
    pub items: Vec<AttendanceItem>,
}

impl AttendanceSheet {
    #[must_use]
    pub fn new(class_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            class_id: class_id.into(),
            date,
            items: Vec::new(),
        }
    }

    /// Set a student's mark, replacing any earlier mark for the same student
    #[must_use]
    pub fn with_mark(mut self, student_id: impl Into<String>, status: AttendanceStatus) -> Self {
        let student_id = student_id.into();
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.student_id == student_id)
        {
            item.status = status;
        } else {
            self.items.push(AttendanceItem { student_id, status });
        }
        self
    }

    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == status)
            .count()
    }
}

impl Payload for AttendanceSheet {
    const KIND: RecordKind = RecordKind::Attendance;

    fn apply_server_fields(&mut self, fields: &Map<String, Value>) {
        if let Some(items) = fields.get("items") {
            match serde_json::from_value::<Vec<AttendanceItem>>(items.clone()) {
                Ok(items) => self.items = items,
                Err(error) => {
                    tracing::debug!("Ignoring malformed attendance items from server: {error}");
                }
            }
        }
    }
}
