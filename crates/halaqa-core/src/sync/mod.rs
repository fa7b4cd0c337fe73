//! Offline write queue: submission, retry and reconciliation.
//!
//! A store creates a record and asks the [`QueueManager`] to submit it.
//! Failed submissions land in the store's [`SyncQueue`]; a later
//! [`QueueManager::drain`] retries every queued entry once, in FIFO order,
//! and reconciles server ids into the records and their dependents.

mod http;
mod manager;
mod queue;
mod submitter;
pub mod transport;

pub use http::HttpSubmitter;
pub use manager::{DrainReport, QueueManager, RetryPolicy, SubmitStatus, SyncTarget};
pub use queue::{QueueEntry, SyncQueue};
pub use submitter::{Accepted, FailureReason, SubmitOutcome, Submission, Submitter};
pub use transport::{ReqwestTransport, Transport};
