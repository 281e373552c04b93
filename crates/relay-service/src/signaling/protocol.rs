//! JSON wire protocol spoken over the `/ws` endpoint.
//!
//! Every frame is a JSON object with a `type` tag:
//!
//! | Direction | `type` | Fields |
//! |-----------|--------|--------|
//! | client → relay | `join_room` | `room_id`, `user_id` |
//! | client → relay | `send_signal` | `room_id`, `user_id`, `signal_data`, `signal_type?` |
//! | client → relay | `leave_room` | `room_id` |
//! | relay → client | `peer_joined` | `room_id`, `user_id`, `connection_id` |
//! | relay → client | `signal_received` | `room_id`, `sender_connection_id`, `from_user_id`, `signal_data` |
//! | relay → client | `peer_left` | `room_id`, `connection_id` |
//! | relay → client | `error` | `code`, `message` |
//!
//! `signal_data` is opaque to the relay and forwarded verbatim.

use crate::errors::RelayError;

use common::types::{ConnectionId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or re-announce presence in) a room.
    JoinRoom {
        room_id: String,
        #[serde(default)]
        user_id: UserId,
    },

    /// Relay a WebRTC handshake payload to everyone in a room.
    SendSignal {
        room_id: String,
        #[serde(default)]
        user_id: UserId,
        signal_data: String,
        /// Optional hint ("offer", "answer", "candidate"); used for metrics only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal_type: Option<String>,
    },

    /// Leave a single room without disconnecting.
    LeaveRoom { room_id: String },
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(|e| RelayError::InvalidMessage(e.to_string()))
    }

    /// Bounded label for metrics and logs.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::SendSignal { .. } => "send_signal",
            ClientMessage::LeaveRoom { .. } => "leave_room",
        }
    }
}

/// Kind of WebRTC handshake payload, as hinted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
    Other,
}

impl SignalKind {
    /// Map the client's optional `signal_type` hint onto a bounded set.
    #[must_use]
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(str::to_ascii_lowercase).as_deref() {
            Some("offer") => SignalKind::Offer,
            Some("answer") => SignalKind::Answer,
            Some("candidate" | "ice" | "ice-candidate" | "ice_candidate") => {
                SignalKind::Candidate
            }
            _ => SignalKind::Other,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::Candidate => "candidate",
            SignalKind::Other => "other",
        }
    }
}

/// An event delivered to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A connection joined `room_id`. Also echoed to the joiner itself, which
    /// is how a client learns its own connection id.
    PeerJoined {
        room_id: RoomId,
        user_id: UserId,
        connection_id: ConnectionId,
    },

    /// A signaling payload was relayed into `room_id`.
    SignalReceived {
        room_id: RoomId,
        sender_connection_id: ConnectionId,
        from_user_id: UserId,
        signal_data: String,
    },

    /// A connection left `room_id` (explicitly or by disconnecting).
    PeerLeft {
        room_id: RoomId,
        connection_id: ConnectionId,
    },

    /// A request from this client was rejected.
    Error { code: i32, message: String },
}

impl ServerEvent {
    /// Build the client-facing error event for a rejected request.
    #[must_use]
    pub fn from_error(err: &RelayError) -> Self {
        ServerEvent::Error {
            code: err.error_code(),
            message: err.client_message(),
        }
    }

    /// Bounded label for metrics and logs.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::PeerJoined { .. } => "peer_joined",
            ServerEvent::SignalReceived { .. } => "signal_received",
            ServerEvent::PeerLeft { .. } => "peer_left",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Internal(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_decode_join_room() {
        let msg =
            ClientMessage::decode(r#"{"type":"join_room","room_id":"lobby","user_id":"alice"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room_id: "lobby".to_string(),
                user_id: UserId::from("alice"),
            }
        );
        assert_eq!(msg.message_type(), "join_room");
    }

    #[test]
    fn test_decode_join_room_without_user_id() {
        let msg = ClientMessage::decode(r#"{"type":"join_room","room_id":"lobby"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::JoinRoom { user_id, .. } if user_id.as_str().is_empty()));
    }

    #[test]
    fn test_decode_send_signal_keeps_payload_verbatim() {
        let payload = r#"{"type":"offer","sdp":"v=0\r\no=- 46117 2 IN IP4 127.0.0.1"}"#;
        let frame = json!({
            "type": "send_signal",
            "room_id": "lobby",
            "user_id": "bob",
            "signal_data": payload,
            "signal_type": "offer",
        })
        .to_string();

        let msg = ClientMessage::decode(&frame).unwrap();
        match msg {
            ClientMessage::SendSignal {
                signal_data,
                signal_type,
                ..
            } => {
                assert_eq!(signal_data, payload);
                assert_eq!(signal_type.as_deref(), Some("offer"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_garbage() {
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"shout","room_id":"x"}"#),
            Err(RelayError::InvalidMessage(_))
        ));
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(RelayError::InvalidMessage(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"send_signal","room_id":"x"}"#),
            Err(RelayError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_signal_kind_from_hint() {
        assert_eq!(SignalKind::from_hint(Some("offer")), SignalKind::Offer);
        assert_eq!(SignalKind::from_hint(Some("ANSWER")), SignalKind::Answer);
        assert_eq!(
            SignalKind::from_hint(Some("candidate")),
            SignalKind::Candidate
        );
        assert_eq!(SignalKind::from_hint(Some("renegotiate")), SignalKind::Other);
        assert_eq!(SignalKind::from_hint(None), SignalKind::Other);
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::PeerJoined {
            room_id: RoomId::parse("lobby").unwrap(),
            user_id: UserId::from("alice"),
            connection_id: ConnectionId::from("c1"),
        };

        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "peer_joined",
                "room_id": "lobby",
                "user_id": "alice",
                "connection_id": "c1",
            })
        );

        let event = ServerEvent::SignalReceived {
            room_id: RoomId::parse("lobby").unwrap(),
            sender_connection_id: ConnectionId::from("c2"),
            from_user_id: UserId::from("bob"),
            signal_data: "{offer-sdp}".to_string(),
        };
        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "signal_received");
        assert_eq!(value["sender_connection_id"], "c2");
        assert_eq!(value["from_user_id"], "bob");
        assert_eq!(value["signal_data"], "{offer-sdp}");
    }

    #[test]
    fn test_error_event_uses_client_message() {
        let err = RelayError::Internal("mailbox closed".to_string());
        let event = ServerEvent::from_error(&err);
        assert_eq!(
            event,
            ServerEvent::Error {
                code: 6,
                message: "An internal error occurred".to_string(),
            }
        );
        assert_eq!(event.event_type(), "error");
    }
}
