//! Store snapshot persistence

#![allow(clippy::cast_possible_wrap)] // SQLite stores positions as i64

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};

use crate::error::{Error, Result};
use crate::models::{LocalId, Payload, Record, RecordKind, RecordStatus, ServerId};
use crate::store::{AttendanceStore, RecordSet, SessionStore};
use crate::sync::{QueueEntry, SyncQueue, SyncTarget};

/// Trait for saving and restoring stores
pub trait StoreRepository {
    /// Load the attendance store; an empty database yields an empty store
    fn load_attendance(&self) -> Result<AttendanceStore>;

    /// Replace the persisted attendance store with `store`
    fn save_attendance(&self, store: &AttendanceStore) -> Result<()>;

    /// Load the session store, notes included
    fn load_sessions(&self) -> Result<SessionStore>;

    /// Replace the persisted session store with `store`
    fn save_sessions(&self, store: &SessionStore) -> Result<()>;
}

/// `SQLite` implementation of `StoreRepository`
pub struct SqliteStoreRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStoreRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn save_records<P: Payload>(tx: &Transaction<'_>, set: &RecordSet<P>) -> Result<()> {
        let kind = P::KIND.as_str();
        tx.execute("DELETE FROM records WHERE kind = ?", params![kind])?;

        let mut stmt = tx.prepare(
            "INSERT INTO records
                (kind, local_id, server_id, status, payload, created_at, synced_position)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for record in set.iter() {
            let synced_position = set
                .synced_ids()
                .iter()
                .position(|id| id == &record.local_id)
                .map(|position| position as i64);
            stmt.execute(params![
                kind,
                record.local_id.as_str(),
                record.server_id().map(ServerId::as_str),
                record.status().as_str(),
                serde_json::to_string(&record.payload)?,
                record.created_at.to_rfc3339(),
                synced_position,
            ])?;
        }
        Ok(())
    }

    fn load_records<P: Payload>(&self) -> Result<RecordSet<P>> {
        let kind = P::KIND;
        let mut stmt = self.conn.prepare(
            "SELECT local_id, server_id, status, payload, created_at, synced_position
             FROM records WHERE kind = ? ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<i64>>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        let mut synced: Vec<(i64, LocalId)> = Vec::new();
        for row in rows {
            let (local_id, server_id, status, payload, created_at, synced_position) = row?;
            let corrupt = |what: &str| corrupt_row(kind, &local_id, what);

            let parsed_id: LocalId = local_id.parse().map_err(|_| corrupt("local id"))?;
            let status: RecordStatus = status.parse().map_err(|_| corrupt("status"))?;
            let created_at: DateTime<Utc> =
                created_at.parse().map_err(|_| corrupt("created_at"))?;
            let payload: P = serde_json::from_str(&payload)?;
            let server_id = server_id.and_then(ServerId::new);

            let record = Record::from_parts(parsed_id, server_id, payload, created_at, status)
                .ok_or_else(|| corrupt("server id and status"))?;
            if let Some(position) = synced_position {
                synced.push((position, parsed_id));
            }
            records.push(record);
        }

        synced.sort_by_key(|(position, _)| *position);
        Ok(RecordSet::from_records(
            records,
            synced.into_iter().map(|(_, id)| id).collect(),
        ))
    }

    fn save_queue(tx: &Transaction<'_>, kind: RecordKind, queue: &SyncQueue) -> Result<()> {
        tx.execute(
            "DELETE FROM queue_entries WHERE kind = ?",
            params![kind.as_str()],
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO queue_entries
                (kind, local_id, position, failure_reason, attempts, rejections,
                 first_failed_at, last_failed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (position, entry) in queue.iter().enumerate() {
            stmt.execute(params![
                kind.as_str(),
                entry.local_id.as_str(),
                position as i64,
                entry.failure_reason.as_str(),
                entry.attempts,
                entry.rejections,
                entry.first_failed_at.to_rfc3339(),
                entry.last_failed_at.to_rfc3339(),
            ])?;
        }
        Ok(())
    }

    fn load_queue(&self, kind: RecordKind) -> Result<SyncQueue> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, failure_reason, attempts, rejections, first_failed_at, last_failed_at
             FROM queue_entries WHERE kind = ? ORDER BY position",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (local_id, reason, attempts, rejections, first_failed_at, last_failed_at) = row?;
            let corrupt = |what: &str| corrupt_row(kind, &local_id, what);
            entries.push(QueueEntry {
                local_id: local_id.parse().map_err(|_| corrupt("local id"))?,
                failure_reason: reason.parse().map_err(|_| corrupt("failure reason"))?,
                attempts,
                rejections,
                first_failed_at: first_failed_at
                    .parse()
                    .map_err(|_| corrupt("first_failed_at"))?,
                last_failed_at: last_failed_at
                    .parse()
                    .map_err(|_| corrupt("last_failed_at"))?,
            });
        }
        Ok(SyncQueue::from_entries(entries))
    }
}

fn corrupt_row(kind: RecordKind, local_id: &str, what: &str) -> Error {
    Error::InvalidInput(format!("stored {kind} {local_id} has an invalid {what}"))
}

impl StoreRepository for SqliteStoreRepository<'_> {
    fn load_attendance(&self) -> Result<AttendanceStore> {
        let records = self.load_records()?;
        let queue = self.load_queue(RecordKind::Attendance)?;
        Ok(AttendanceStore::from_parts(records, queue))
    }

    fn save_attendance(&self, store: &AttendanceStore) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        Self::save_records(&tx, store.records())?;
        Self::save_queue(&tx, RecordKind::Attendance, store.queue())?;
        tx.commit()?;
        Ok(())
    }

    fn load_sessions(&self) -> Result<SessionStore> {
        let sessions = self.load_records()?;
        let session_queue = self.load_queue(RecordKind::Session)?;
        let note_queue = self.load_queue(RecordKind::Note)?;
        Ok(SessionStore::from_parts(sessions, session_queue, note_queue))
    }

    fn save_sessions(&self, store: &SessionStore) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        Self::save_records(&tx, store.sessions())?;
        Self::save_queue(&tx, RecordKind::Session, store.session_queue())?;
        Self::save_queue(&tx, RecordKind::Note, store.note_queue())?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{
        AttendanceSheet, AttendanceStatus, Checkpoint, RecitationSession, SessionKind,
    };
    use crate::sync::{Accepted, FailureReason};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sheet(class_id: &str) -> AttendanceSheet {
        AttendanceSheet::new(class_id, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap())
            .with_mark("s1", AttendanceStatus::Absent)
    }

    fn session() -> RecitationSession {
        RecitationSession::new(
            "student-3",
            SessionKind::Revision,
            Checkpoint {
                from: "78:1".parse().unwrap(),
                to: "78:40".parse().unwrap(),
            },
        )
    }

    #[test]
    fn empty_database_loads_empty_stores() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteStoreRepository::new(db.connection());

        assert!(repo.load_attendance().unwrap().records().is_empty());
        assert!(repo.load_sessions().unwrap().sessions().is_empty());
    }

    #[test]
    fn attendance_roundtrip_keeps_queue_order_and_counters() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteStoreRepository::new(db.connection());

        let mut store = AttendanceStore::new();
        let ids: Vec<_> = ["a", "b", "c"].into_iter().map(|c| store.create(sheet(c))).collect();
        for id in ids.iter().rev() {
            store.mark_pending(id);
            store.queue_mut().record_failure(*id, FailureReason::NetworkUnreachable);
        }
        store.queue_mut().record_failure(ids[1], FailureReason::Rejected);

        repo.save_attendance(&store).unwrap();
        let loaded = repo.load_attendance().unwrap();

        assert_eq!(loaded.queue().snapshot(), vec![ids[2], ids[1], ids[0]]);
        let entry = loaded.queue().get(&ids[1]).unwrap();
        assert_eq!(entry.failure_reason, FailureReason::Rejected);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.rejections, 1);
        assert_eq!(loaded.get(&ids[0]), store.get(&ids[0]));
        assert!(loaded.get(&ids[0]).unwrap().is_pending());
    }

    #[test]
    fn sessions_roundtrip_keeps_notes_and_synced_order() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("halaqa.db");

        let mut store = SessionStore::new();
        let first = store.create(session().with_note("tajweed"));
        let second = store.create(session());
        store
            .reconcile(&second, Accepted::new(ServerId::new("srv-2").unwrap()))
            .unwrap();
        store
            .reconcile(&first, Accepted::new(ServerId::new("srv-1").unwrap()))
            .unwrap();
        let note = store.add_note(&second, "well done").unwrap();
        store.notes().queue_mut().record_failure(note, FailureReason::Unknown);

        {
            let db = Database::open(&path).unwrap();
            SqliteStoreRepository::new(db.connection())
                .save_sessions(&store)
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let loaded = SqliteStoreRepository::new(db.connection())
            .load_sessions()
            .unwrap();

        assert_eq!(loaded.sessions().synced_ids(), &[second, first]);
        assert_eq!(loaded.note_queue().snapshot(), vec![note]);
        assert_eq!(loaded.owner_of(&note), Some(second));
        assert_eq!(
            loaded.note(&note).unwrap().session_id,
            ServerId::new("srv-2")
        );
        assert_eq!(
            loaded.get(&first).unwrap().payload.notes[0].session_id,
            ServerId::new("srv-1")
        );
        assert!(loaded.verify().is_ok());
    }

    #[test]
    fn saving_replaces_previous_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteStoreRepository::new(db.connection());

        let mut store = AttendanceStore::new();
        let id = store.create(sheet("a"));
        store.queue_mut().record_failure(id, FailureReason::Unknown);
        repo.save_attendance(&store).unwrap();

        store.remove_record(&id);
        store.queue_mut().remove(&id);
        repo.save_attendance(&store).unwrap();

        let loaded = repo.load_attendance().unwrap();
        assert!(loaded.records().is_empty());
        assert!(loaded.queue().is_empty());
    }

    #[test]
    fn inconsistent_row_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO records (kind, local_id, server_id, status, payload, created_at)
                 VALUES ('attendance', ?, NULL, 'synced', ?, ?)",
                params![
                    LocalId::new().as_str(),
                    serde_json::to_string(&sheet("a")).unwrap(),
                    Utc::now().to_rfc3339()
                ],
            )
            .unwrap();

        let repo = SqliteStoreRepository::new(db.connection());
        assert!(matches!(
            repo.load_attendance(),
            Err(Error::InvalidInput(_))
        ));
    }
}
