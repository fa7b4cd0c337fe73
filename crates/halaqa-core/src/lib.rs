//! halaqa-core - Core library for Halaqa
//!
//! Records attendance and recitation sessions offline-first: every record is
//! created locally, submitted once, and queued for a later drain when the
//! backend cannot be reached. Successful submissions reconcile the server
//! id into the record and its dependent notes.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use models::{LocalId, RecordKind, ServerId};
pub use services::{Connectivity, PendingCounts, SyncService};
