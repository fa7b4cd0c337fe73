//! Stores owning records, their synced collections and their queues.
//!
//! A store is the only writer of its records and queue. Cloning a store
//! gives a consistent read snapshot.

mod attendance;
mod records;
mod session;

pub use attendance::AttendanceStore;
pub use records::RecordSet;
pub use session::{NoteTarget, SessionStore};
