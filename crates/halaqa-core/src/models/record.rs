//! Record model shared by every syncable kind

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::{LocalId, ServerId};

/// The kinds of records that travel through a sync queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Attendance,
    Session,
    Note,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Session => "session",
            Self::Note => "note",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendance" => Ok(Self::Attendance),
            "session" => Ok(Self::Session),
            "note" => Ok(Self::Note),
            other => Err(format!("unknown record kind '{other}'")),
        }
    }
}

/// Lifecycle of a record with respect to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Created locally, never submitted
    #[default]
    Draft,
    /// Last submission failed; waiting in its store's queue
    Pending,
    /// Accepted by the backend; carries a server id
    Synced,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            other => Err(format!("unknown record status '{other}'")),
        }
    }
}

/// Domain fields of a syncable record
pub trait Payload: Clone + fmt::Debug + Serialize + DeserializeOwned {
    /// Queue the payload belongs to
    const KIND: RecordKind;

    /// Merge fields normalized by the backend into the local payload.
    ///
    /// Unknown or malformed fields are ignored; the local value wins.
    fn apply_server_fields(&mut self, fields: &Map<String, Value>);
}

/// A locally created unit of domain data awaiting or having completed
/// server persistence.
///
/// The server id and status are private so they can only move forward:
/// `Draft -> Pending -> Synced` or `Draft -> Synced`, and a server id once
/// set is never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
pub struct Record<P> {
    pub local_id: LocalId,
    server_id: Option<ServerId>,
    pub payload: P,
    /// Creation time, serialized as ISO-8601
    pub created_at: DateTime<Utc>,
    status: RecordStatus,
}

impl<P: Payload> Record<P> {
    /// Create a new draft record stamped with the current time
    #[must_use]
    pub fn new(payload: P) -> Self {
        Self {
            local_id: LocalId::new(),
            server_id: None,
            payload,
            created_at: Utc::now(),
            status: RecordStatus::Draft,
        }
    }

    /// Rebuild a record from persisted parts.
    ///
    /// Returns `None` when the parts contradict each other (a synced record
    /// without server id, or a server id on an unsynced record).
    pub fn from_parts(
        local_id: LocalId,
        server_id: Option<ServerId>,
        payload: P,
        created_at: DateTime<Utc>,
        status: RecordStatus,
    ) -> Option<Self> {
        let consistent = match status {
            RecordStatus::Synced => server_id.is_some(),
            RecordStatus::Draft | RecordStatus::Pending => server_id.is_none(),
        };
        consistent.then_some(Self {
            local_id,
            server_id,
            payload,
            created_at,
            status,
        })
    }

    pub const fn kind(&self) -> RecordKind {
        P::KIND
    }

    pub const fn server_id(&self) -> Option<&ServerId> {
        self.server_id.as_ref()
    }

    pub const fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    pub fn is_synced(&self) -> bool {
        self.status == RecordStatus::Synced
    }

    pub(crate) fn mark_pending(&mut self) {
        if self.status != RecordStatus::Synced {
            self.status = RecordStatus::Pending;
        }
    }

    /// Attach the server id and merge normalized fields.
    pub(crate) fn reconcile(&mut self, server_id: ServerId, fields: &Map<String, Value>) {
        if let Some(existing) = &self.server_id {
            if existing != &server_id {
                tracing::warn!(
                    "Ignoring server id {} for {} {}: already reconciled as {}",
                    server_id,
                    P::KIND,
                    self.local_id,
                    existing
                );
            }
        } else {
            self.server_id = Some(server_id);
        }
        self.payload.apply_server_fields(fields);
        self.status = RecordStatus::Synced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Dummy {
        label: String,
    }

    impl Payload for Dummy {
        const KIND: RecordKind = RecordKind::Attendance;

        fn apply_server_fields(&mut self, fields: &Map<String, Value>) {
            if let Some(Value::String(label)) = fields.get("label") {
                self.label.clone_from(label);
            }
        }
    }

    fn dummy() -> Record<Dummy> {
        Record::new(Dummy {
            label: "local".to_string(),
        })
    }

    #[test]
    fn new_record_is_draft_without_server_id() {
        let record = dummy();
        assert_eq!(record.status(), RecordStatus::Draft);
        assert!(record.server_id().is_none());
        assert_eq!(record.kind(), RecordKind::Attendance);
    }

    #[test]
    fn reconcile_sets_server_id_and_merges_fields() {
        let mut record = dummy();
        record.mark_pending();

        let mut fields = Map::new();
        fields.insert("label".to_string(), Value::String("server".to_string()));
        record.reconcile(ServerId::new("srv-1").unwrap(), &fields);

        assert!(record.is_synced());
        assert_eq!(record.server_id().unwrap().as_str(), "srv-1");
        assert_eq!(record.payload.label, "server");
    }

    #[test]
    fn server_id_is_never_replaced() {
        let mut record = dummy();
        record.reconcile(ServerId::new("srv-1").unwrap(), &Map::new());
        record.reconcile(ServerId::new("srv-2").unwrap(), &Map::new());
        assert_eq!(record.server_id().unwrap().as_str(), "srv-1");
    }

    #[test]
    fn synced_record_does_not_fall_back_to_pending() {
        let mut record = dummy();
        record.reconcile(ServerId::new("srv-1").unwrap(), &Map::new());
        record.mark_pending();
        assert!(record.is_synced());
    }

    #[test]
    fn from_parts_rejects_inconsistent_state() {
        let record = dummy();
        assert!(Record::from_parts(
            record.local_id,
            None,
            record.payload.clone(),
            record.created_at,
            RecordStatus::Synced,
        )
        .is_none());
        assert!(Record::from_parts(
            record.local_id,
            ServerId::new("srv-1"),
            record.payload.clone(),
            record.created_at,
            RecordStatus::Pending,
        )
        .is_none());
    }

    #[test]
    fn created_at_serializes_as_iso8601() {
        let record = dummy();
        let json = serde_json::to_value(&record).unwrap();
        let created_at = json["created_at"].as_str().unwrap();
        assert!(created_at.parse::<DateTime<Utc>>().is_ok());
        assert_eq!(json["status"], "draft");
    }

    #[test]
    fn record_kind_roundtrips_through_str() {
        for kind in [RecordKind::Attendance, RecordKind::Session, RecordKind::Note] {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("unknown".parse::<RecordKind>().is_err());
    }
}
