//! Identifier types for signal relay components.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a room identifier, in bytes.
pub const MAX_ROOM_ID_LEN: usize = 256;

/// Opaque identifier for one live transport session.
///
/// Assigned by the transport layer; unique among active sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new random connection ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a room identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomIdError {
    #[error("room id must not be empty")]
    Empty,

    #[error("room id exceeds {MAX_ROOM_ID_LEN} bytes")]
    TooLong,
}

/// Name of a room, supplied by clients and created on first use.
///
/// Only constructible through [`RoomId::parse`], so every `RoomId` in the
/// system is non-empty and bounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Validate and wrap a client-supplied room name.
    ///
    /// Any non-empty string up to [`MAX_ROOM_ID_LEN`] bytes is accepted as-is.
    /// Whitespace is significant: `" lobby"`, `"lobby"` and `"   "` are three
    /// different rooms.
    pub fn parse(value: impl Into<String>) -> Result<Self, RoomIdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(RoomIdError::Empty);
        }
        if value.len() > MAX_ROOM_ID_LEN {
            return Err(RoomIdError::TooLong);
        }
        Ok(Self(value))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RoomId::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application-level user identifier announced by a client.
///
/// Not authenticated and not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_parse_accepts_normal_names() {
        let room = RoomId::parse("lobby").unwrap();
        assert_eq!(room.as_str(), "lobby");
        assert_eq!(room.to_string(), "lobby");
    }

    #[test]
    fn test_room_id_parse_rejects_only_empty() {
        assert_eq!(RoomId::parse(""), Err(RoomIdError::Empty));

        let blank = RoomId::parse("   ").unwrap();
        assert_eq!(blank.as_str(), "   ");
        assert_ne!(RoomId::parse(" lobby").unwrap(), RoomId::parse("lobby").unwrap());
    }

    #[test]
    fn test_room_id_parse_length_boundary() {
        assert!(RoomId::parse("a".repeat(MAX_ROOM_ID_LEN)).is_ok());
        assert_eq!(
            RoomId::parse("a".repeat(MAX_ROOM_ID_LEN + 1)),
            Err(RoomIdError::TooLong)
        );
    }

    #[test]
    fn test_room_id_deserialize_validates() {
        let room: RoomId = serde_json::from_str("\"call-42\"").unwrap();
        assert_eq!(room.as_str(), "call-42");

        let result: Result<RoomId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let conn = ConnectionId::from("c1");
        let user = UserId::from("alice");
        assert_eq!(serde_json::to_string(&conn).unwrap(), "\"c1\"");
        assert_eq!(serde_json::to_string(&user).unwrap(), "\"alice\"");
    }
}
