//! Services shared by Halaqa hosts

mod sync_service;

pub use sync_service::{
    Connectivity, DrainSummary, NoteDelivery, PendingCounts, Recorded, SyncService,
};
