//! Identifier Types
//!
//! String-backed identifiers for entity types and players, plus a UUID-backed
//! identifier for individual bond sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an entity *type* (e.g. "ember_wraith").
///
/// Relationship state is keyed by this id, not by any spawned instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier of one bond session, from begin to termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Builds a version 4 id from caller-supplied random bytes, so a seeded
    /// engine hands out the same ids on every run.
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bond_{}", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let entity = EntityId::from("ember_wraith");
        assert_eq!(serde_json::to_string(&entity).unwrap(), "\"ember_wraith\"");

        let player: PlayerId = serde_json::from_str("\"player_1\"").unwrap();
        assert_eq!(player.as_str(), "player_1");
    }

    #[test]
    fn test_session_ids_follow_their_bytes() {
        let a = SessionId::from_random_bytes([7; 16]);
        assert_eq!(a, SessionId::from_random_bytes([7; 16]));
        assert_ne!(a, SessionId::from_random_bytes([8; 16]));
        assert_eq!(a.0.get_version_num(), 4);
        assert!(a.to_string().starts_with("bond_"));
    }
}
