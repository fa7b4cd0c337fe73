//! Enqueue-on-failure, drain and reconciliation.

use serde::Serialize;

use super::{Accepted, FailureReason, Submission, Submitter, SyncQueue};
use crate::error::{Error, Result};
use crate::models::{LocalId, RecordKind, ServerId};

/// A store that owns records of one kind together with their queue.
///
/// The store is the only writer of its records and queue; the manager
/// drives it through this trait.
pub trait SyncTarget {
    fn kind(&self) -> RecordKind;

    fn queue(&self) -> &SyncQueue;

    fn queue_mut(&mut self) -> &mut SyncQueue;

    /// Whether the store holds the record at all
    fn contains(&self, local_id: &LocalId) -> bool;

    /// Build the submission for a record, `None` if it cannot be sent
    fn submission(&self, local_id: &LocalId) -> Option<Submission>;

    /// Whether the record already carries a server id
    fn is_synced(&self, local_id: &LocalId) -> bool;

    /// Whether the record's dependencies allow sending it now
    fn is_ready(&self, _local_id: &LocalId) -> bool {
        true
    }

    fn mark_pending(&mut self, local_id: &LocalId);

    /// Apply a server id and normalized fields to the record and its
    /// dependents, then file it in the synced collection.
    fn reconcile(&mut self, local_id: &LocalId, accepted: Accepted) -> Result<()>;

    /// Forget a record entirely; returns whether it existed
    fn remove_record(&mut self, local_id: &LocalId) -> bool;

    /// State a record should be saved in while its first attempt is in
    /// flight: if the attempt never reports back, it is already queued as
    /// unreachable.
    fn stage_in_flight(&mut self, local_id: &LocalId) {
        self.mark_pending(local_id);
        self.queue_mut()
            .record_failure(*local_id, FailureReason::NetworkUnreachable);
    }
}

/// What to do with entries the backend keeps refusing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Drop an entry (and its record) after this many consecutive
    /// rejections. `None` keeps retrying forever.
    pub max_rejected_attempts: Option<u32>,
}

impl RetryPolicy {
    const fn should_drop(&self, rejections: u32) -> bool {
        match self.max_rejected_attempts {
            Some(limit) => rejections >= limit,
            None => false,
        }
    }
}

/// Outcome of a direct submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Synced(ServerId),
    Queued(FailureReason),
}

/// Summary of one drain pass over a single queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub kind: RecordKind,
    pub attempted: usize,
    pub synced: Vec<(LocalId, ServerId)>,
    pub failed: Vec<(LocalId, FailureReason)>,
    /// Entries left alone because a dependency is not synced yet
    pub skipped: Vec<LocalId>,
    /// Entries removed after exhausting the rejection budget
    pub dropped: Vec<LocalId>,
    /// Queue length once the pass finished
    pub remaining: usize,
}

impl DrainReport {
    const fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            attempted: 0,
            synced: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            dropped: Vec::new(),
            remaining: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.remaining == 0
    }
}

/// Orchestrates submissions for any [`SyncTarget`].
///
/// Runs on one logical task: each attempt is awaited and fully applied
/// before the next one starts.
pub struct QueueManager<S> {
    submitter: S,
    policy: RetryPolicy,
}

impl<S: Submitter> QueueManager<S> {
    pub fn new(submitter: S) -> Self {
        Self {
            submitter,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn submitter(&self) -> &S {
        &self.submitter
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Submit a record once; on failure it is queued (or its entry updated).
    pub async fn submit<T: SyncTarget>(
        &self,
        target: &mut T,
        local_id: &LocalId,
    ) -> Result<SubmitStatus> {
        let kind = target.kind();
        if target.is_synced(local_id) {
            return Err(Error::InvalidInput(format!(
                "{kind} {local_id} is already synced"
            )));
        }
        if !target.is_ready(local_id) {
            return Err(Error::InvalidInput(format!(
                "{kind} {local_id} depends on a record that is not synced yet"
            )));
        }
        let submission = target
            .submission(local_id)
            .ok_or_else(|| Error::NotFound(local_id.to_string()))?;

        match self.submitter.submit(&submission).await {
            Ok(accepted) => {
                let server_id = accepted.server_id.clone();
                target.reconcile(local_id, accepted)?;
                target.queue_mut().remove(local_id);
                tracing::debug!("Submitted {kind} {local_id} as {server_id}");
                Ok(SubmitStatus::Synced(server_id))
            }
            Err(reason) => {
                target.mark_pending(local_id);
                let entry = target.queue_mut().record_failure(*local_id, reason);
                tracing::warn!(
                    "Queued {kind} {local_id} after failed submission ({reason}, attempt {})",
                    entry.attempts
                );
                Ok(SubmitStatus::Queued(reason))
            }
        }
    }

    /// One pass over the queue as it stood when the drain started.
    ///
    /// Failures stay queued and never abort the pass. A queue entry whose
    /// record is missing is a corrupted store and aborts with
    /// [`Error::QueueCorrupted`].
    pub async fn drain<T: SyncTarget>(&self, target: &mut T) -> Result<DrainReport> {
        self.drain_with(target, |_| Ok(())).await
    }

    /// [`Self::drain`], calling `applied` with the target after every
    /// outcome has been applied to it. An error from `applied` stops the
    /// pass.
    pub async fn drain_with<T, F>(&self, target: &mut T, mut applied: F) -> Result<DrainReport>
    where
        T: SyncTarget,
        F: FnMut(&T) -> Result<()>,
    {
        let kind = target.kind();
        let snapshot = target.queue().snapshot();
        let mut report = DrainReport::new(kind);

        if snapshot.is_empty() {
            return Ok(report);
        }
        tracing::info!("Draining {} queued {kind} record(s)", snapshot.len());

        for local_id in snapshot {
            if !target.queue().contains(&local_id) {
                continue;
            }
            let corrupted = || Error::QueueCorrupted {
                kind,
                local_id: local_id.to_string(),
            };
            if !target.contains(&local_id) {
                return Err(corrupted());
            }
            if !target.is_ready(&local_id) {
                tracing::debug!("Skipping {kind} {local_id}: dependency not synced yet");
                report.skipped.push(local_id);
                continue;
            }
            let submission = target.submission(&local_id).ok_or_else(corrupted)?;

            report.attempted += 1;
            match self.submitter.submit(&submission).await {
                Ok(accepted) => {
                    let server_id = accepted.server_id.clone();
                    target.reconcile(&local_id, accepted)?;
                    target.queue_mut().remove(&local_id);
                    tracing::debug!("Reconciled {kind} {local_id} as {server_id}");
                    report.synced.push((local_id, server_id));
                }
                Err(reason) => {
                    let entry = target.queue_mut().record_failure(local_id, reason);
                    let (attempts, rejections) = (entry.attempts, entry.rejections);
                    if self.policy.should_drop(rejections) {
                        target.queue_mut().remove(&local_id);
                        target.remove_record(&local_id);
                        tracing::warn!(
                            "Dropped {kind} {local_id} after {rejections} consecutive rejections"
                        );
                        report.dropped.push(local_id);
                    } else {
                        tracing::warn!(
                            "Retry of {kind} {local_id} failed ({reason}, attempt {attempts})"
                        );
                        report.failed.push((local_id, reason));
                    }
                }
            }
            applied(&*target)?;
        }

        report.remaining = target.queue().len();
        tracing::info!(
            "Drain of {kind} queue finished: {} synced, {} failed, {} skipped, {} dropped, {} remaining",
            report.synced.len(),
            report.failed.len(),
            report.skipped.len(),
            report.dropped.len(),
            report.remaining
        );
        Ok(report)
    }

    /// Manually give up on a pending record: its entry and the record go.
    pub fn discard<T: SyncTarget>(&self, target: &mut T, local_id: &LocalId) -> Result<()> {
        let kind = target.kind();
        if target.queue_mut().remove(local_id).is_none() {
            return Err(Error::InvalidInput(format!(
                "{kind} {local_id} is not waiting in the sync queue"
            )));
        }
        target.remove_record(local_id);
        tracing::warn!("Discarded pending {kind} {local_id}");
        Ok(())
    }
}
