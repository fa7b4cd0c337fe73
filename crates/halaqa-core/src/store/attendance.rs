//! Attendance store

use super::RecordSet;
use crate::error::{Error, Result};
use crate::models::{AttendanceRecord, AttendanceSheet, LocalId, Record, RecordKind};
use crate::sync::{Accepted, Submission, SyncQueue, SyncTarget};

/// Owns attendance records and the attendance queue
#[derive(Debug, Clone, Default)]
pub struct AttendanceStore {
    records: RecordSet<AttendanceSheet>,
    queue: SyncQueue,
}

impl AttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from persisted parts
    pub const fn from_parts(records: RecordSet<AttendanceSheet>, queue: SyncQueue) -> Self {
        Self { records, queue }
    }

    /// Record a roll call locally as a draft
    pub fn create(&mut self, sheet: AttendanceSheet) -> LocalId {
        self.records.insert(Record::new(sheet))
    }

    pub fn get(&self, local_id: &LocalId) -> Option<&AttendanceRecord> {
        self.records.get(local_id)
    }

    pub const fn records(&self) -> &RecordSet<AttendanceSheet> {
        &self.records
    }

    /// Synced sheets in the order the backend accepted them
    pub fn synced(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.records.synced()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub const fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Check that every queue entry points at a record this store holds
    pub fn verify(&self) -> Result<()> {
        match self
            .queue
            .iter()
            .find(|entry| !self.records.contains(&entry.local_id))
        {
            Some(entry) => Err(Error::QueueCorrupted {
                kind: RecordKind::Attendance,
                local_id: entry.local_id.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl SyncTarget for AttendanceStore {
    fn kind(&self) -> RecordKind {
        RecordKind::Attendance
    }

    fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    fn queue_mut(&mut self) -> &mut SyncQueue {
        &mut self.queue
    }

    fn contains(&self, local_id: &LocalId) -> bool {
        self.records.contains(local_id)
    }

    fn submission(&self, local_id: &LocalId) -> Option<Submission> {
        self.records.get(local_id).map(|record| Submission::Attendance {
            local_id: record.local_id,
            created_at: record.created_at,
            sheet: record.payload.clone(),
        })
    }

    fn is_synced(&self, local_id: &LocalId) -> bool {
        self.records.get(local_id).is_some_and(Record::is_synced)
    }

    fn mark_pending(&mut self, local_id: &LocalId) {
        if let Some(record) = self.records.get_mut(local_id) {
            record.mark_pending();
        }
    }

    fn reconcile(&mut self, local_id: &LocalId, accepted: Accepted) -> Result<()> {
        self.records.reconcile(local_id, accepted).map(|_| ())
    }

    fn remove_record(&mut self, local_id: &LocalId) -> bool {
        self.records.remove(local_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, RecordStatus, ServerId};
    use crate::sync::FailureReason;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sheet() -> AttendanceSheet {
        AttendanceSheet::new("halaqa-fajr", NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
            .with_mark("s1", AttendanceStatus::Present)
            .with_mark("s2", AttendanceStatus::Late)
    }

    #[test]
    fn create_stores_draft() {
        let mut store = AttendanceStore::new();
        let id = store.create(sheet());

        let record = store.get(&id).unwrap();
        assert_eq!(record.status(), RecordStatus::Draft);
        assert_eq!(record.payload.count(AttendanceStatus::Present), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn reconcile_moves_record_to_synced() {
        let mut store = AttendanceStore::new();
        let id = store.create(sheet());
        store.mark_pending(&id);
        store.queue_mut().record_failure(id, FailureReason::NetworkUnreachable);

        store
            .reconcile(&id, Accepted::new(ServerId::new("srv-42").unwrap()))
            .unwrap();
        store.queue_mut().remove(&id);

        let synced: Vec<_> = store.synced().map(|record| record.local_id).collect();
        assert_eq!(synced, vec![id]);
        assert_eq!(store.get(&id).unwrap().server_id().unwrap().as_str(), "srv-42");
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn verify_detects_orphan_entry() {
        let mut store = AttendanceStore::new();
        store.queue_mut().record_failure(LocalId::new(), FailureReason::Unknown);
        assert!(matches!(store.verify(), Err(Error::QueueCorrupted { .. })));
    }
}
