//! Signal relay error types.
//!
//! Error types map to `error` event codes sent back to the requesting client,
//! and to HTTP status codes on the introspection API. Internal details are
//! logged server-side but not exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::types::RoomIdError;
use serde::Serialize;
use thiserror::Error;

/// Relay error type.
///
/// Maps to client-facing error codes:
/// - `InvalidRoomId`, `InvalidMessage`: `INVALID_REQUEST` (1)
/// - `ConnectionNotFound`, `RoomNotFound`: `NOT_FOUND` (4)
/// - `Conflict`: `CONFLICT` (5)
/// - `Internal`: `INTERNAL_ERROR` (6)
/// - `RoomCapacityExceeded`, `RelayCapacityExceeded`, `Draining`: `CAPACITY_EXCEEDED` (7)
#[derive(Debug, Error)]
pub enum RelayError {
    /// Room identifier failed validation.
    #[error("Invalid room id: {0}")]
    InvalidRoomId(#[from] RoomIdError),

    /// Client frame could not be decoded.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Connection is not (or no longer) live in the registry.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Room has no members (introspection only; joins create rooms).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Conflict error (e.g., connection id already registered).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Room is at its member limit.
    #[error("Room at capacity: {0}")]
    RoomCapacityExceeded(String),

    /// Relay is at its connection limit (load shedding).
    #[error("Relay at capacity")]
    RelayCapacityExceeded,

    /// Relay is draining (graceful shutdown).
    #[error("Relay is draining")]
    Draining,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the client-facing error code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            RelayError::InvalidRoomId(_) | RelayError::InvalidMessage(_) => 1, // INVALID_REQUEST
            RelayError::ConnectionNotFound(_) | RelayError::RoomNotFound(_) => 4, // NOT_FOUND
            RelayError::Conflict(_) => 5,                                      // CONFLICT
            RelayError::Internal(_) => 6,                                      // INTERNAL_ERROR
            RelayError::RoomCapacityExceeded(_)
            | RelayError::RelayCapacityExceeded
            | RelayError::Draining => 7, // CAPACITY_EXCEEDED
        }
    }

    /// Returns a bounded label for metrics.
    pub fn code_label(&self) -> &'static str {
        match self {
            RelayError::InvalidRoomId(_) => "invalid_room_id",
            RelayError::InvalidMessage(_) => "invalid_message",
            RelayError::ConnectionNotFound(_) => "connection_not_found",
            RelayError::RoomNotFound(_) => "room_not_found",
            RelayError::Conflict(_) => "conflict",
            RelayError::RoomCapacityExceeded(_) => "room_capacity_exceeded",
            RelayError::RelayCapacityExceeded => "relay_capacity_exceeded",
            RelayError::Draining => "draining",
            RelayError::Internal(_) => "internal",
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            RelayError::InvalidRoomId(e) => format!("Invalid room id: {e}"),
            RelayError::InvalidMessage(_) => "Malformed message".to_string(),
            RelayError::ConnectionNotFound(_) => "Connection is not registered".to_string(),
            RelayError::RoomNotFound(_) => "Room not found".to_string(),
            RelayError::Conflict(msg) => msg.clone(),
            RelayError::RoomCapacityExceeded(_) => "Room is full".to_string(),
            RelayError::RelayCapacityExceeded => {
                "Server is at capacity, please try again".to_string()
            }
            RelayError::Draining => "Server is shutting down, please reconnect".to_string(),
            RelayError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Returns the HTTP status for this error on the REST surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRoomId(_) | RelayError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            RelayError::ConnectionNotFound(_) | RelayError::RoomNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            RelayError::Conflict(_) => StatusCode::CONFLICT,
            RelayError::RoomCapacityExceeded(_)
            | RelayError::RelayCapacityExceeded
            | RelayError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if let RelayError::Internal(detail) = &self {
            tracing::error!(target: "relay.http", error = %detail, "Request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code_label(),
                message: self.client_message(),
            },
        };
        (self.status_code(), Json(body)).into_response()
    }
}
