//! Recitation session model and its dependent notes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::{LocalId, Payload, RecordKind, ServerId};

/// A verse position, written `surah:ayah` (e.g. `2:255`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseRef {
    pub surah: u16,
    pub ayah: u16,
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surah, self.ayah)
    }
}

impl FromStr for VerseRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (surah, ayah) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected surah:ayah, got '{s}'"))?;
        let surah = surah
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("invalid surah in '{s}'"))?;
        let ayah = ayah
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("invalid ayah in '{s}'"))?;
        if !(1..=114).contains(&surah) || ayah == 0 {
            return Err(format!("verse reference out of range: '{s}'"));
        }
        Ok(Self { surah, ayah })
    }
}

/// Range of verses covered by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub from: VerseRef,
    pub to: VerseRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// New memorization (hifz)
    #[default]
    Memorization,
    /// Revision of previously memorized portions (muraja'a)
    Revision,
}

/// Teacher's assessment of a recitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    VeryGood,
    Good,
    Acceptable,
    Weak,
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "excellent" => Ok(Self::Excellent),
            "very_good" => Ok(Self::VeryGood),
            "good" => Ok(Self::Good),
            "acceptable" => Ok(Self::Acceptable),
            "weak" => Ok(Self::Weak),
            other => Err(format!("unknown grade '{other}'")),
        }
    }
}

/// A teacher note attached to a session
///
/// `session_id` stays empty until the owning session has a server id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNote {
    pub local_id: LocalId,
    #[serde(default)]
    pub server_id: Option<ServerId>,
    #[serde(default)]
    pub session_id: Option<ServerId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl SessionNote {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            local_id: LocalId::new(),
            server_id: None,
            session_id: None,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    pub const fn is_synced(&self) -> bool {
        self.server_id.is_some()
    }

    /// Merge a server representation of this note (`id`, `body`)
    pub(crate) fn apply_server_fields(&mut self, fields: &Map<String, Value>) {
        if self.server_id.is_none() {
            self.server_id = fields.get("id").and_then(server_id_from_value);
        }
        if let Some(Value::String(body)) = fields.get("body") {
            self.body.clone_from(body);
        }
    }
}

/// One recitation or memorization session of a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecitationSession {
    pub student_id: String,
    #[serde(default)]
    pub kind: SessionKind,
    pub checkpoint: Checkpoint,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub notes: Vec<SessionNote>,
}

impl RecitationSession {
    #[must_use]
    pub fn new(student_id: impl Into<String>, kind: SessionKind, checkpoint: Checkpoint) -> Self {
        Self {
            student_id: student_id.into(),
            kind,
            checkpoint,
            grade: None,
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = Some(grade);
        self
    }

    #[must_use]
    pub fn with_note(mut self, body: impl Into<String>) -> Self {
        self.notes.push(SessionNote::new(body));
        self
    }

    pub fn note(&self, local_id: &LocalId) -> Option<&SessionNote> {
        self.notes.iter().find(|note| &note.local_id == local_id)
    }

    pub fn note_mut(&mut self, local_id: &LocalId) -> Option<&mut SessionNote> {
        self.notes.iter_mut().find(|note| &note.local_id == local_id)
    }

    /// Point every note at the session's server id.
    pub(crate) fn attach_session_id(&mut self, session_id: &ServerId) {
        for note in &mut self.notes {
            note.session_id = Some(session_id.clone());
        }
    }
}

impl Payload for RecitationSession {
    const KIND: RecordKind = RecordKind::Session;

    fn apply_server_fields(&mut self, fields: &Map<String, Value>) {
        if let Some(grade) = fields.get("grade") {
            if let Ok(grade) = serde_json::from_value::<Option<Grade>>(grade.clone()) {
                self.grade = grade;
            }
        }
        if let Some(checkpoint) = fields.get("checkpoint") {
            if let Ok(checkpoint) = serde_json::from_value::<Checkpoint>(checkpoint.clone()) {
                self.checkpoint = checkpoint;
            }
        }
        // Reshaped notes come back in submission order.
        if let Some(Value::Array(server_notes)) = fields.get("notes") {
            for (note, server_note) in self.notes.iter_mut().zip(server_notes) {
                if let Value::Object(server_note) = server_note {
                    note.apply_server_fields(server_note);
                }
            }
        }
    }
}

/// Accept string or numeric ids from the backend
pub(crate) fn server_id_from_value(value: &Value) -> Option<ServerId> {
    match value {
        Value::String(id) => ServerId::new(id.as_str()),
        Value::Number(id) => ServerId::new(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn checkpoint() -> Checkpoint {
        Checkpoint {
            from: "2:1".parse().unwrap(),
            to: "2:20".parse().unwrap(),
        }
    }

    #[test]
    fn verse_ref_parse_and_display() {
        let verse: VerseRef = " 2:255 ".parse().unwrap();
        assert_eq!(verse, VerseRef { surah: 2, ayah: 255 });
        assert_eq!(verse.to_string(), "2:255");
    }

    #[test]
    fn verse_ref_rejects_invalid_input() {
        assert!("2".parse::<VerseRef>().is_err());
        assert!("115:1".parse::<VerseRef>().is_err());
        assert!("2:0".parse::<VerseRef>().is_err());
        assert!("a:b".parse::<VerseRef>().is_err());
    }

    #[test]
    fn grade_parse_accepts_dashes() {
        assert_eq!("very-good".parse::<Grade>().unwrap(), Grade::VeryGood);
        assert_eq!("Excellent".parse::<Grade>().unwrap(), Grade::Excellent);
        assert!("great".parse::<Grade>().is_err());
    }

    #[test]
    fn attach_session_id_updates_every_note() {
        let mut session = RecitationSession::new("s1", SessionKind::Memorization, checkpoint())
            .with_note("first")
            .with_note("second");
        let id = ServerId::new("srv-9").unwrap();
        session.attach_session_id(&id);
        assert!(session
            .notes
            .iter()
            .all(|note| note.session_id.as_ref() == Some(&id)));
    }

    #[test]
    fn server_fields_reshape_notes_by_position() {
        let mut session = RecitationSession::new("s1", SessionKind::Revision, checkpoint())
            .with_note("tajweed on madd")
            .with_note("repeat ayah 5");
        let fields = json!({
            "grade": "good",
            "notes": [
                { "id": 11, "body": "Tajweed: madd" },
                { "id": "n-12" }
            ]
        });

        session.apply_server_fields(fields.as_object().unwrap());

        assert_eq!(session.grade, Some(Grade::Good));
        assert_eq!(session.notes[0].server_id, ServerId::new("11"));
        assert_eq!(session.notes[0].body, "Tajweed: madd");
        assert_eq!(session.notes[1].server_id, ServerId::new("n-12"));
        assert_eq!(session.notes[1].body, "repeat ayah 5");
    }

    #[test]
    fn unknown_server_fields_leave_session_untouched() {
        let original = RecitationSession::new("s1", SessionKind::Memorization, checkpoint());
        let mut session = original.clone();
        let fields = json!({ "grade": 42, "checkpoint": "2:1-2:20", "extra": true });
        session.apply_server_fields(fields.as_object().unwrap());
        assert_eq!(session, original);
    }
}
