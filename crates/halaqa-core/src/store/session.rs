//! Recitation session store and its note queue

use std::collections::HashMap;

use super::RecordSet;
use crate::error::{Error, Result};
use crate::models::{
    LocalId, RecitationSession, Record, RecordKind, SessionNote, SessionRecord,
};
use crate::sync::{Accepted, Submission, SyncQueue, SyncTarget};

/// Owns sessions, the notes they hold, and the session and note queues.
///
/// Notes written before their session is synced travel inside the session
/// submission. Notes added to an already synced session are submitted on
/// their own through [`SessionStore::notes`].
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: RecordSet<RecitationSession>,
    session_queue: SyncQueue,
    note_queue: SyncQueue,
    /// Note local id -> owning session local id
    note_owner: HashMap<LocalId, LocalId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from persisted parts
    pub fn from_parts(
        sessions: RecordSet<RecitationSession>,
        session_queue: SyncQueue,
        note_queue: SyncQueue,
    ) -> Self {
        let mut store = Self {
            sessions,
            session_queue,
            note_queue,
            note_owner: HashMap::new(),
        };
        store.index_notes();
        store
    }

    fn index_notes(&mut self) {
        self.note_owner = self
            .sessions
            .iter()
            .flat_map(|record| {
                record
                    .payload
                    .notes
                    .iter()
                    .map(move |note| (note.local_id, record.local_id))
            })
            .collect();
    }

    /// Record a session locally as a draft
    pub fn create(&mut self, session: RecitationSession) -> LocalId {
        let record = Record::new(session);
        for note in &record.payload.notes {
            self.note_owner.insert(note.local_id, record.local_id);
        }
        self.sessions.insert(record)
    }

    /// Attach a note to a session.
    ///
    /// When the session already has a server id the note gets it as its
    /// `session_id` and must be submitted through [`Self::notes`].
    pub fn add_note(&mut self, session_id: &LocalId, body: impl Into<String>) -> Result<LocalId> {
        let record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(session_id.to_string()))?;
        let mut note = SessionNote::new(body);
        note.session_id = record.server_id().cloned();
        let note_id = note.local_id;
        record.payload.notes.push(note);
        self.note_owner.insert(note_id, *session_id);
        Ok(note_id)
    }

    pub fn get(&self, local_id: &LocalId) -> Option<&SessionRecord> {
        self.sessions.get(local_id)
    }

    /// Resolve a session from its local id or its server id
    pub fn find(&self, id: &str) -> Option<&SessionRecord> {
        let id = id.trim();
        if let Ok(local_id) = id.parse::<LocalId>() {
            if let Some(record) = self.sessions.get(&local_id) {
                return Some(record);
            }
        }
        self.sessions
            .iter()
            .find(|record| record.server_id().is_some_and(|server| server.as_str() == id))
    }

    pub fn note(&self, note_id: &LocalId) -> Option<&SessionNote> {
        let owner = self.note_owner.get(note_id)?;
        self.sessions.get(owner)?.payload.note(note_id)
    }

    fn note_mut(&mut self, note_id: &LocalId) -> Option<&mut SessionNote> {
        let owner = self.note_owner.get(note_id)?;
        self.sessions.get_mut(owner)?.payload.note_mut(note_id)
    }

    /// Local id of the session holding a note
    pub fn owner_of(&self, note_id: &LocalId) -> Option<LocalId> {
        self.note_owner.get(note_id).copied()
    }

    pub const fn sessions(&self) -> &RecordSet<RecitationSession> {
        &self.sessions
    }

    /// Synced sessions in the order the backend accepted them
    pub fn synced(&self) -> impl Iterator<Item = &SessionRecord> {
        self.sessions.synced()
    }

    pub const fn session_queue(&self) -> &SyncQueue {
        &self.session_queue
    }

    pub const fn note_queue(&self) -> &SyncQueue {
        &self.note_queue
    }

    pub fn pending_sessions(&self) -> usize {
        self.session_queue.len()
    }

    pub fn pending_notes(&self) -> usize {
        self.note_queue.len()
    }

    /// Sync target view over the notes of this store
    pub fn notes(&mut self) -> NoteTarget<'_> {
        NoteTarget { store: self }
    }

    /// Check that every queue entry points at a record this store holds
    pub fn verify(&self) -> Result<()> {
        if let Some(entry) = self
            .session_queue
            .iter()
            .find(|entry| !self.sessions.contains(&entry.local_id))
        {
            return Err(Error::QueueCorrupted {
                kind: RecordKind::Session,
                local_id: entry.local_id.to_string(),
            });
        }
        if let Some(entry) = self
            .note_queue
            .iter()
            .find(|entry| self.note(&entry.local_id).is_none())
        {
            return Err(Error::QueueCorrupted {
                kind: RecordKind::Note,
                local_id: entry.local_id.to_string(),
            });
        }
        Ok(())
    }
}

impl SyncTarget for SessionStore {
    fn kind(&self) -> RecordKind {
        RecordKind::Session
    }

    fn queue(&self) -> &SyncQueue {
        &self.session_queue
    }

    fn queue_mut(&mut self) -> &mut SyncQueue {
        &mut self.session_queue
    }

    fn contains(&self, local_id: &LocalId) -> bool {
        self.sessions.contains(local_id)
    }

    fn submission(&self, local_id: &LocalId) -> Option<Submission> {
        self.sessions.get(local_id).map(|record| Submission::Session {
            local_id: record.local_id,
            created_at: record.created_at,
            session: record.payload.clone(),
        })
    }

    fn is_synced(&self, local_id: &LocalId) -> bool {
        self.sessions.get(local_id).is_some_and(Record::is_synced)
    }

    fn mark_pending(&mut self, local_id: &LocalId) {
        if let Some(record) = self.sessions.get_mut(local_id) {
            record.mark_pending();
        }
    }

    /// The session's server id reaches every note it holds in the same step.
    fn reconcile(&mut self, local_id: &LocalId, accepted: Accepted) -> Result<()> {
        let record = self.sessions.reconcile(local_id, accepted)?;
        if let Some(server_id) = record.server_id().cloned() {
            record.payload.attach_session_id(&server_id);
        }
        Ok(())
    }

    fn remove_record(&mut self, local_id: &LocalId) -> bool {
        let Some(record) = self.sessions.remove(local_id) else {
            return false;
        };
        for note in &record.payload.notes {
            self.note_owner.remove(&note.local_id);
            self.note_queue.remove(&note.local_id);
        }
        true
    }
}

/// The notes of a [`SessionStore`] seen as their own sync target.
///
/// A note is only sent once it carries its session's server id; until
/// then a drain leaves it queued.
pub struct NoteTarget<'a> {
    store: &'a mut SessionStore,
}

impl NoteTarget<'_> {
    /// The store the notes live in
    pub fn store(&self) -> &SessionStore {
        self.store
    }
}

impl SyncTarget for NoteTarget<'_> {
    fn kind(&self) -> RecordKind {
        RecordKind::Note
    }

    fn queue(&self) -> &SyncQueue {
        &self.store.note_queue
    }

    fn queue_mut(&mut self) -> &mut SyncQueue {
        &mut self.store.note_queue
    }

    fn contains(&self, local_id: &LocalId) -> bool {
        self.store.note(local_id).is_some()
    }

    fn submission(&self, local_id: &LocalId) -> Option<Submission> {
        let note = self.store.note(local_id)?;
        Some(Submission::Note {
            local_id: note.local_id,
            created_at: note.created_at,
            session_id: note.session_id.clone()?,
            body: note.body.clone(),
        })
    }

    fn is_synced(&self, local_id: &LocalId) -> bool {
        self.store.note(local_id).is_some_and(SessionNote::is_synced)
    }

    fn is_ready(&self, local_id: &LocalId) -> bool {
        self.store
            .note(local_id)
            .is_some_and(|note| note.session_id.is_some())
    }

    // Notes carry no status of their own; queue membership is the state.
    fn mark_pending(&mut self, _local_id: &LocalId) {}

    fn reconcile(&mut self, local_id: &LocalId, accepted: Accepted) -> Result<()> {
        let note = self
            .store
            .note_mut(local_id)
            .ok_or_else(|| Error::NotFound(local_id.to_string()))?;
        if let Some(existing) = &note.server_id {
            if existing != &accepted.server_id {
                tracing::warn!(
                    "Ignoring server id {} for note {local_id}: already reconciled as {existing}",
                    accepted.server_id
                );
            }
        } else {
            note.server_id = Some(accepted.server_id);
        }
        note.apply_server_fields(&accepted.fields);
        Ok(())
    }

    fn remove_record(&mut self, local_id: &LocalId) -> bool {
        let Some(owner) = self.store.note_owner.remove(local_id) else {
            return false;
        };
        let Some(record) = self.store.sessions.get_mut(&owner) else {
            return false;
        };
        let before = record.payload.notes.len();
        record.payload.notes.retain(|note| &note.local_id != local_id);
        record.payload.notes.len() != before
    }
}
