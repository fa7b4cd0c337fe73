//! Shared sync service wrapper used by hosts.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::config::SyncConfig;
use crate::db::{Database, SqliteStoreRepository, StoreRepository};
use crate::error::{Error, Result};
use crate::models::{AttendanceSheet, LocalId, RecitationSession, RecordKind};
use crate::store::{AttendanceStore, SessionStore};
use crate::sync::{
    DrainReport, HttpSubmitter, QueueManager, ReqwestTransport, SubmitStatus, Submitter,
    SyncTarget,
};

/// Network reachability as reported by the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

/// A record created through the service and what happened to its first
/// submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub local_id: LocalId,
    pub status: SubmitStatus,
}

/// What happened to a freshly added note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteDelivery {
    /// The session is synced, so the note was submitted on its own
    Submitted(SubmitStatus),
    /// The session is still pending; the note travels with it
    WithSession,
}

/// Queue lengths shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub attendance: usize,
    pub sessions: usize,
    pub notes: usize,
}

impl PendingCounts {
    pub const fn total(&self) -> usize {
        self.attendance + self.sessions + self.notes
    }
}

/// Reports of one full drain, one per queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub sessions: DrainReport,
    pub notes: DrainReport,
    pub attendance: DrainReport,
}

impl DrainSummary {
    pub fn reports(&self) -> [&DrainReport; 3] {
        [&self.sessions, &self.notes, &self.attendance]
    }

    pub fn synced_count(&self) -> usize {
        self.reports().iter().map(|report| report.synced.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.reports().iter().all(|report| report.is_clean())
    }
}

struct State {
    attendance: AttendanceStore,
    sessions: SessionStore,
    db: Option<Database>,
}

fn save_attendance(db: Option<&Database>, store: &AttendanceStore) -> Result<()> {
    db.map_or(Ok(()), |db| {
        SqliteStoreRepository::new(db.connection()).save_attendance(store)
    })
}

fn save_sessions(db: Option<&Database>, store: &SessionStore) -> Result<()> {
    db.map_or(Ok(()), |db| {
        SqliteStoreRepository::new(db.connection()).save_sessions(store)
    })
}

impl State {
    fn persist_attendance(&self) -> Result<()> {
        save_attendance(self.db.as_ref(), &self.attendance)
    }

    fn persist_sessions(&self) -> Result<()> {
        save_sessions(self.db.as_ref(), &self.sessions)
    }

    /// Save the attendance store as if the attempt on `local_id` had
    /// already failed, so an interrupted attempt leaves it queued.
    fn persist_attendance_in_flight(&self, local_id: &LocalId) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let mut staged = self.attendance.clone();
        staged.stage_in_flight(local_id);
        save_attendance(Some(db), &staged)
    }

    fn persist_sessions_in_flight(&self, local_id: &LocalId, kind: RecordKind) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let mut staged = self.sessions.clone();
        if kind == RecordKind::Note {
            staged.notes().stage_in_flight(local_id);
        } else {
            staged.stage_in_flight(local_id);
        }
        save_sessions(Some(db), &staged)
    }

    fn pending_counts(&self) -> PendingCounts {
        PendingCounts {
            attendance: self.attendance.pending_count(),
            sessions: self.sessions.pending_sessions(),
            notes: self.sessions.pending_notes(),
        }
    }
}

/// Thread-safe facade over the stores, their queues and persistence.
///
/// Every operation takes the state lock for its whole duration, so a drain
/// and a new recording never interleave.
pub struct SyncService<S> {
    state: Arc<Mutex<State>>,
    manager: Arc<QueueManager<S>>,
}

impl<S> Clone for SyncService<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            manager: Arc::clone(&self.manager),
        }
    }
}

impl SyncService<HttpSubmitter<ReqwestTransport>> {
    /// Build the HTTP-backed service from a validated config
    pub fn from_config(config: &SyncConfig, db: Option<Database>) -> Result<Self> {
        let base_url = config
            .api_base_url
            .clone()
            .ok_or_else(|| Error::Config("api_base_url is required".to_string()))?;
        let transport = ReqwestTransport::from_config(config)?;
        let manager = QueueManager::new(HttpSubmitter::new(transport, base_url))
            .with_policy(config.retry_policy());
        match db {
            Some(db) => Self::with_database(manager, db),
            None => Ok(Self::new(manager)),
        }
    }
}

impl<S: Submitter> SyncService<S> {
    /// In-memory service without persistence
    pub fn new(manager: QueueManager<S>) -> Self {
        Self::from_state(
            manager,
            State {
                attendance: AttendanceStore::new(),
                sessions: SessionStore::new(),
                db: None,
            },
        )
    }

    /// Service backed by `db`; stores and queues are restored from it.
    ///
    /// Restored entries wait for the next drain.
    pub fn with_database(manager: QueueManager<S>, db: Database) -> Result<Self> {
        let repo = SqliteStoreRepository::new(db.connection());
        let attendance = repo.load_attendance()?;
        let sessions = repo.load_sessions()?;
        attendance.verify()?;
        sessions.verify()?;
        let state = State {
            attendance,
            sessions,
            db: Some(db),
        };
        let pending = state.pending_counts();
        if pending.total() > 0 {
            tracing::info!(
                "Restored {} pending record(s): {} attendance, {} session, {} note",
                pending.total(),
                pending.attendance,
                pending.sessions,
                pending.notes
            );
        }
        Ok(Self::from_state(manager, state))
    }

    fn from_state(manager: QueueManager<S>, state: State) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            manager: Arc::new(manager),
        }
    }

    /// Store an attendance sheet and try to submit it once
    pub async fn record_attendance(&self, sheet: AttendanceSheet) -> Result<Recorded> {
        let mut state = self.state.lock().await;
        let local_id = state.attendance.create(sheet);
        state.persist_attendance_in_flight(&local_id)?;

        let status = self.manager.submit(&mut state.attendance, &local_id).await?;
        state.persist_attendance()?;
        Ok(Recorded { local_id, status })
    }

    /// Store a session (with its notes) and try to submit it once
    pub async fn record_session(&self, session: RecitationSession) -> Result<Recorded> {
        let mut state = self.state.lock().await;
        let local_id = state.sessions.create(session);
        state.persist_sessions_in_flight(&local_id, RecordKind::Session)?;

        let status = self.manager.submit(&mut state.sessions, &local_id).await?;
        state.persist_sessions()?;
        Ok(Recorded { local_id, status })
    }

    /// Add a note to a session named by its local or server id
    pub async fn add_note(&self, session: &str, body: &str) -> Result<(LocalId, NoteDelivery)> {
        let body = body.trim();
        if body.is_empty() {
            return Err(Error::InvalidInput("Note body cannot be empty".to_string()));
        }

        let mut state = self.state.lock().await;
        let (session_id, session_synced) = state
            .sessions
            .find(session)
            .map(|record| (record.local_id, record.is_synced()))
            .ok_or_else(|| Error::NotFound(format!("session {session}")))?;
        let note_id = state.sessions.add_note(&session_id, body)?;
        if !session_synced {
            state.persist_sessions()?;
            return Ok((note_id, NoteDelivery::WithSession));
        }
        state.persist_sessions_in_flight(&note_id, RecordKind::Note)?;
        let status = self
            .manager
            .submit(&mut state.sessions.notes(), &note_id)
            .await?;
        state.persist_sessions()?;
        Ok((note_id, NoteDelivery::Submitted(status)))
    }

    /// Retry every queue once: sessions, then their notes, then attendance.
    ///
    /// State is saved after every applied outcome, and once more after each
    /// queue even when it turns out to be corrupted.
    pub async fn drain(&self) -> Result<DrainSummary> {
        let mut guard = self.state.lock().await;
        let State {
            attendance,
            sessions,
            db,
        } = &mut *guard;
        let db = db.as_ref();

        let session_report = self
            .manager
            .drain_with(sessions, |store| save_sessions(db, store))
            .await;
        save_sessions(db, sessions)?;
        let session_report = session_report?;

        let note_report = self
            .manager
            .drain_with(&mut sessions.notes(), |notes| save_sessions(db, notes.store()))
            .await;
        save_sessions(db, sessions)?;
        let note_report = note_report?;

        let attendance_report = self
            .manager
            .drain_with(attendance, |store| save_attendance(db, store))
            .await;
        save_attendance(db, attendance)?;
        let attendance_report = attendance_report?;

        Ok(DrainSummary {
            sessions: session_report,
            notes: note_report,
            attendance: attendance_report,
        })
    }

    /// Drain on every offline to online transition until the sender is
    /// dropped.
    pub async fn drain_on_reconnect(
        &self,
        mut connectivity: watch::Receiver<Connectivity>,
    ) -> Result<()> {
        let mut previous = *connectivity.borrow_and_update();
        while connectivity.changed().await.is_ok() {
            let current = *connectivity.borrow_and_update();
            if previous == Connectivity::Offline && current == Connectivity::Online {
                tracing::info!("Connectivity restored, draining sync queues");
                let summary = self.drain().await?;
                tracing::info!("Reconnect drain synced {} record(s)", summary.synced_count());
            }
            previous = current;
        }
        Ok(())
    }

    pub async fn pending_counts(&self) -> PendingCounts {
        self.state.lock().await.pending_counts()
    }

    /// Give up on a queued record of any kind; returns its kind
    pub async fn discard(&self, local_id: &LocalId) -> Result<RecordKind> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.attendance.queue().contains(local_id) {
            self.manager.discard(&mut state.attendance, local_id)?;
            state.persist_attendance()?;
            return Ok(RecordKind::Attendance);
        }
        if state.sessions.session_queue().contains(local_id) {
            self.manager.discard(&mut state.sessions, local_id)?;
            state.persist_sessions()?;
            return Ok(RecordKind::Session);
        }
        if state.sessions.note_queue().contains(local_id) {
            self.manager.discard(&mut state.sessions.notes(), local_id)?;
            state.persist_sessions()?;
            return Ok(RecordKind::Note);
        }
        Err(Error::InvalidInput(format!(
            "{local_id} is not waiting in any sync queue"
        )))
    }

    /// Read snapshot of the attendance store
    pub async fn attendance(&self) -> AttendanceStore {
        self.state.lock().await.attendance.clone()
    }

    /// Read snapshot of the session store
    pub async fn sessions(&self) -> SessionStore {
        self.state.lock().await.sessions.clone()
    }
}
