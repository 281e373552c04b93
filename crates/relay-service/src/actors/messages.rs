//! Message types for the registry actor.
//!
//! All registry access goes through `tokio::sync::mpsc`; request-reply uses
//! `tokio::sync::oneshot`.

use crate::errors::RelayError;

use super::connection::ConnectionHandle;

use chrono::{DateTime, Utc};
use common::types::{ConnectionId, RoomId, UserId};
use serde::Serialize;
use tokio::sync::oneshot;

/// Messages sent to `RoomRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Make a connection live so it can join rooms and relay signals.
    RegisterConnection {
        connection: ConnectionHandle,
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },

    /// Add a connection to a room and announce it to every member.
    JoinRoom {
        room_id: RoomId,
        connection_id: ConnectionId,
        user_id: UserId,
        respond_to: oneshot::Sender<Result<JoinOutcome, RelayError>>,
    },

    /// Fan a signaling payload out to a room.
    RelaySignal {
        room_id: RoomId,
        connection_id: ConnectionId,
        from_user_id: UserId,
        signal_data: String,
        /// Metrics label only.
        signal_type: &'static str,
        respond_to: oneshot::Sender<Result<SignalOutcome, RelayError>>,
    },

    /// Remove a connection from one room.
    LeaveRoom {
        room_id: RoomId,
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Result<LeaveOutcome, RelayError>>,
    },

    /// Remove a connection from every room and forget it.
    Disconnect {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<DisconnectOutcome>,
    },

    /// Snapshot one room.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Option<RoomInfo>>,
    },

    /// Snapshot registry counters.
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// Stop accepting connections and ask every live connection to close.
    Shutdown {
        /// Receives the number of connections asked to close.
        respond_to: oneshot::Sender<usize>,
    },
}

impl RegistryMessage {
    /// Bounded label for latency metrics and logs.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            RegistryMessage::RegisterConnection { .. } => "register_connection",
            RegistryMessage::JoinRoom { .. } => "join_room",
            RegistryMessage::RelaySignal { .. } => "relay_signal",
            RegistryMessage::LeaveRoom { .. } => "leave_room",
            RegistryMessage::Disconnect { .. } => "disconnect",
            RegistryMessage::GetRoom { .. } => "get_room",
            RegistryMessage::GetStatus { .. } => "get_status",
            RegistryMessage::Shutdown { .. } => "shutdown",
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// False when the connection was already a member (re-join).
    pub newly_added: bool,
    /// Members that were handed the `peer_joined` event.
    pub recipients: usize,
    /// Room size after the join.
    pub member_count: usize,
}

/// Result of a relayed signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalOutcome {
    /// Members that were handed the `signal_received` event.
    pub recipients: usize,
}

/// Result of leaving one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// False when the connection was not a member (no-op).
    pub was_member: bool,
    /// Remaining members that were handed `peer_left`.
    pub recipients: usize,
    /// The room became empty and was removed.
    pub room_removed: bool,
}

/// Result of a disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectOutcome {
    /// Whether the connection was live before the call.
    pub was_registered: bool,
    /// Rooms the connection was removed from. One `peer_left` per entry.
    pub rooms_left: Vec<RoomId>,
    /// Total `peer_left` deliveries across those rooms.
    pub recipients: usize,
}

/// A room member as reported by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

/// Room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
    /// Members in join order.
    pub members: Vec<MemberInfo>,
}

/// Registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub relay_id: String,
    pub room_count: usize,
    pub connection_count: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}
