//! Local and server identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Client-generated identity of a record, using UUID v7 (time-sortable)
///
/// Assigned once at creation and never changed, whatever the record's
/// server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier assigned by the backend once a submission succeeds
///
/// Never empty: an absent server id is modelled as `Option<ServerId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerId(String);

impl ServerId {
    /// Build a server id, returning `None` for blank input
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ServerId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "server id must not be empty".to_string())
    }
}

impl From<ServerId> for String {
    fn from(value: ServerId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_unique() {
        let id1 = LocalId::new();
        let id2 = LocalId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn local_id_parse() {
        let id = LocalId::new();
        let parsed: LocalId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn server_id_rejects_blank() {
        assert!(ServerId::new("").is_none());
        assert!(ServerId::new("   ").is_none());
        assert_eq!(ServerId::new(" srv-42 ").unwrap().as_str(), "srv-42");
    }

    #[test]
    fn server_id_deserialize_rejects_empty_string() {
        assert!(serde_json::from_str::<ServerId>("\"\"").is_err());
        let id: ServerId = serde_json::from_str("\"srv-7\"").unwrap();
        assert_eq!(id.to_string(), "srv-7");
    }
}
