//! Data models for Halaqa

mod attendance;
mod ids;
mod record;
mod session;

pub use attendance::{AttendanceItem, AttendanceSheet, AttendanceStatus};
pub use ids::{LocalId, ServerId};
pub use record::{Payload, Record, RecordKind, RecordStatus};
pub(crate) use session::server_id_from_value;
pub use session::{Checkpoint, Grade, RecitationSession, SessionKind, SessionNote, VerseRef};

/// An attendance sheet tracked through the sync queue
pub type AttendanceRecord = Record<AttendanceSheet>;

/// A recitation session tracked through the sync queue
pub type SessionRecord = Record<RecitationSession>;
