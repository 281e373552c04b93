//! HTTP routes for the signal relay.
//!
//! Defines the Axum router and application state.

use crate::actors::{ActorMetrics, RoomRegistryActorHandle};
use crate::config::CorsOrigins;
use crate::handlers;
use crate::observability::{health_router, HealthState};
use crate::signaling::TransportSettings;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide room registry.
    pub registry: RoomRegistryActorHandle,

    /// Counters shared with the registry and connection tasks.
    pub metrics: Arc<ActorMetrics>,

    /// Limits applied to every WebSocket connection.
    pub transport: TransportSettings,

    /// Liveness and readiness.
    pub health: Arc<HealthState>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - WebSocket signaling endpoint
/// - `/health`, `/ready` - probes
/// - `/metrics` - Prometheus metrics
/// - `/api/v1/status` - registry counters
/// - `/api/v1/rooms/:room_id` - room members
/// - TraceLayer for request logging
/// - CORS (any origin unless an allow-list is configured)
pub fn build_routes(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    cors_origins: &CorsOrigins,
) -> Router {
    let probe_routes = health_router(Arc::clone(&state.health));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let app_routes = Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/api/v1/status", get(handlers::get_status))
        .route("/api/v1/rooms/:room_id", get(handlers::get_room))
        .with_state(state);

    app_routes
        .merge(probe_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

/// CORS layer for the configured origins.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => AllowOrigin::list(list.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| {
                    warn!(target: "relay.http", origin = %origin, error = %e, "Ignoring invalid CORS origin");
                })
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
