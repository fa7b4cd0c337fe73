//! FIFO queue of records whose last submission failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FailureReason;
use crate::models::LocalId;

/// A record waiting for resubmission, keyed by its local id.
///
/// The entry only points at the record; the owning store holds the record
/// itself so reconciliation is visible wherever the record is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub local_id: LocalId,
    /// Cause of the most recent failed attempt
    pub failure_reason: FailureReason,
    /// Failed attempts so far, including the first submission
    pub attempts: u32,
    /// Consecutive `rejected` failures; reset by any other reason
    pub rejections: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

impl QueueEntry {
    fn new(local_id: LocalId, reason: FailureReason) -> Self {
        let now = Utc::now();
        Self {
            local_id,
            failure_reason: reason,
            attempts: 1,
            rejections: u32::from(reason == FailureReason::Rejected),
            first_failed_at: now,
            last_failed_at: now,
        }
    }

    fn record_failure(&mut self, reason: FailureReason) {
        self.failure_reason = reason;
        self.attempts = self.attempts.saturating_add(1);
        self.rejections = if reason == FailureReason::Rejected {
            self.rejections.saturating_add(1)
        } else {
            0
        };
        self.last_failed_at = Utc::now();
    }
}

/// Ordered entries in order of first failure, at most one per local id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueue {
    entries: Vec<QueueEntry>,
}

impl SyncQueue {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a queue from persisted entries, keeping their order.
    ///
    /// Later duplicates of a local id are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        let mut queue = Self::new();
        for entry in entries {
            if queue.contains(&entry.local_id) {
                tracing::warn!("Dropping duplicate queue entry for {}", entry.local_id);
                continue;
            }
            queue.entries.push(entry);
        }
        queue
    }

    /// Record a failed attempt for `local_id`.
    ///
    /// Appends a new entry on first failure; otherwise updates the existing
    /// entry in place without changing its position. Returns the entry.
    pub fn record_failure(&mut self, local_id: LocalId, reason: FailureReason) -> &QueueEntry {
        let index = if let Some(index) = self.position(&local_id) {
            self.entries[index].record_failure(reason);
            index
        } else {
            self.entries.push(QueueEntry::new(local_id, reason));
            self.entries.len() - 1
        };
        &self.entries[index]
    }

    /// Remove the entry for `local_id`, returning it when present
    pub fn remove(&mut self, local_id: &LocalId) -> Option<QueueEntry> {
        let index = self.position(local_id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, local_id: &LocalId) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| &entry.local_id == local_id)
    }

    pub fn contains(&self, local_id: &LocalId) -> bool {
        self.position(local_id).is_some()
    }

    /// Local ids in FIFO order, detached from the queue
    pub fn snapshot(&self) -> Vec<LocalId> {
        self.entries.iter().map(|entry| entry.local_id).collect()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, local_id: &LocalId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| &entry.local_id == local_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repeated_failures_keep_a_single_entry() {
        let mut queue = SyncQueue::new();
        let id = LocalId::new();

        queue.record_failure(id, FailureReason::NetworkUnreachable);
        let entry = queue.record_failure(id, FailureReason::Rejected);

        assert_eq!(entry.failure_reason, FailureReason::Rejected);
        assert_eq!(entry.attempts, 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn refailing_entry_keeps_its_position() {
        let mut queue = SyncQueue::new();
        let (a, b, c) = (LocalId::new(), LocalId::new(), LocalId::new());
        queue.record_failure(a, FailureReason::NetworkUnreachable);
        queue.record_failure(b, FailureReason::NetworkUnreachable);
        queue.record_failure(c, FailureReason::NetworkUnreachable);

        queue.record_failure(a, FailureReason::Unknown);

        assert_eq!(queue.snapshot(), vec![a, b, c]);
        assert_eq!(queue.get(&a).unwrap().failure_reason, FailureReason::Unknown);
    }

    #[test]
    fn rejections_reset_on_other_failures() {
        let mut queue = SyncQueue::new();
        let id = LocalId::new();
        queue.record_failure(id, FailureReason::Rejected);
        assert_eq!(queue.record_failure(id, FailureReason::Rejected).rejections, 2);
        assert_eq!(
            queue
                .record_failure(id, FailureReason::NetworkUnreachable)
                .rejections,
            0
        );
    }

    #[test]
    fn remove_returns_entry_once() {
        let mut queue = SyncQueue::new();
        let id = LocalId::new();
        queue.record_failure(id, FailureReason::Unknown);

        assert!(queue.remove(&id).is_some());
        assert!(queue.remove(&id).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn from_entries_drops_duplicates() {
        let id = LocalId::new();
        let mut source = SyncQueue::new();
        source.record_failure(id, FailureReason::Unknown);
        let entry = source.entries()[0].clone();

        let queue = SyncQueue::from_entries(vec![entry.clone(), entry]);
        assert_eq!(queue.len(), 1);
    }
}
