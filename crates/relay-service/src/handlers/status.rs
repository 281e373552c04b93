//! Read-only introspection API.
//!
//! - `GET /api/v1/status`: registry counters, failure totals and readiness
//! - `GET /api/v1/rooms/:room_id`: members of one room

use crate::actors::{RegistryStatus, RoomInfo};
use crate::errors::RelayError;
use crate::routes::AppState;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Body of `GET /api/v1/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    #[serde(flatten)]
    pub registry: RegistryStatus,
    /// Events that could not be queued for a recipient, since startup.
    pub deliveries_failed: u64,
    /// Connection tasks that panicked, since startup.
    pub connection_panics: u64,
}

#[tracing::instrument(skip_all, name = "relay.http.status")]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, RelayError> {
    let registry = state.registry.get_status().await?;
    Ok(Json(StatusResponse {
        ready: state.health.is_ready(),
        registry,
        deliveries_failed: state.metrics.delivery_failures(),
        connection_panics: state.metrics.panic_count(),
    }))
}

/// Rooms with no members do not exist, so they are 404.
#[tracing::instrument(skip_all, name = "relay.http.room")]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfo>, RelayError> {
    state
        .registry
        .get_room(&room_id)
        .await?
        .map(Json)
        .ok_or(RelayError::RoomNotFound(room_id))
}
