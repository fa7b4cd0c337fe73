//! Single-attempt remote writes and their tagged outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::models::{AttendanceSheet, LocalId, RecitationSession, RecordKind, ServerId};

/// Classified cause of a failed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// No response: offline, DNS, TLS, timeout
    NetworkUnreachable,
    /// The server refused the payload (4xx)
    Rejected,
    /// Any other unsuccessful response
    Unknown,
}

impl FailureReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "network-unreachable",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network-unreachable" => Ok(Self::NetworkUnreachable),
            "rejected" => Ok(Self::Rejected),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown failure reason '{other}'")),
        }
    }
}

/// A successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub server_id: ServerId,
    /// Server-normalized fields to merge into the local payload
    pub fields: Map<String, Value>,
}

impl Accepted {
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = fields;
        self
    }
}

/// Result of one submission attempt; failures are values, never errors
pub type SubmitOutcome = Result<Accepted, FailureReason>;

/// What a store hands to the submitter: one record of a known kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Attendance {
        local_id: LocalId,
        created_at: DateTime<Utc>,
        sheet: AttendanceSheet,
    },
    Session {
        local_id: LocalId,
        created_at: DateTime<Utc>,
        session: RecitationSession,
    },
    Note {
        local_id: LocalId,
        created_at: DateTime<Utc>,
        session_id: ServerId,
        body: String,
    },
}

impl Submission {
    pub const fn local_id(&self) -> LocalId {
        match self {
            Self::Attendance { local_id, .. }
            | Self::Session { local_id, .. }
            | Self::Note { local_id, .. } => *local_id,
        }
    }

    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Attendance { .. } => RecordKind::Attendance,
            Self::Session { .. } => RecordKind::Session,
            Self::Note { .. } => RecordKind::Note,
        }
    }

    /// JSON body sent to the backend: the payload plus local identity.
    pub fn body(&self) -> serde_json::Result<Value> {
        let (mut body, local_id, created_at) = match self {
            Self::Attendance {
                local_id,
                created_at,
                sheet,
            } => (serde_json::to_value(sheet)?, local_id, created_at),
            Self::Session {
                local_id,
                created_at,
                session,
            } => (serde_json::to_value(session)?, local_id, created_at),
            Self::Note {
                local_id,
                created_at,
                session_id,
                body,
            } => (
                serde_json::json!({ "session_id": session_id, "body": body }),
                local_id,
                created_at,
            ),
        };

        if let Value::Object(map) = &mut body {
            map.insert("local_id".to_string(), Value::String(local_id.as_str()));
            map.insert(
                "created_at".to_string(),
                Value::String(created_at.to_rfc3339()),
            );
        }
        Ok(body)
    }
}

/// Performs exactly one remote write attempt for one record.
///
/// Implementations never retry internally and never touch local state.
#[allow(async_fn_in_trait)]
pub trait Submitter {
    async fn submit(&self, submission: &Submission) -> SubmitOutcome;
}

impl<S: Submitter + ?Sized> Submitter for &S {
    async fn submit(&self, submission: &Submission) -> SubmitOutcome {
        (**self).submit(submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checkpoint, SessionKind};
    use chrono::NaiveDate;

    #[test]
    fn failure_reason_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&FailureReason::NetworkUnreachable).unwrap(),
            "\"network-unreachable\""
        );
        for reason in [
            FailureReason::NetworkUnreachable,
            FailureReason::Rejected,
            FailureReason::Unknown,
        ] {
            assert_eq!(reason.as_str().parse::<FailureReason>().unwrap(), reason);
        }
    }

    #[test]
    fn attendance_body_carries_local_identity() {
        let local_id = LocalId::new();
        let submission = Submission::Attendance {
            local_id,
            created_at: "2024-01-01T10:00:00Z".parse().unwrap(),
            sheet: AttendanceSheet::new("class-1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        };

        let body = submission.body().unwrap();
        assert_eq!(body["class_id"], "class-1");
        assert_eq!(body["local_id"], local_id.as_str());
        assert_eq!(body["created_at"], "2024-01-01T10:00:00+00:00");
        assert_eq!(submission.kind(), RecordKind::Attendance);
    }

    #[test]
    fn session_body_includes_notes() {
        let session = RecitationSession::new(
            "student-1",
            SessionKind::Memorization,
            Checkpoint {
                from: "1:1".parse().unwrap(),
                to: "1:7".parse().unwrap(),
            },
        )
        .with_note("clean recitation");
        let submission = Submission::Session {
            local_id: LocalId::new(),
            created_at: Utc::now(),
            session,
        };

        let body = submission.body().unwrap();
        assert_eq!(body["notes"][0]["body"], "clean recitation");
        assert_eq!(body["checkpoint"]["to"]["ayah"], 7);
    }
}
