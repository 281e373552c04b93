//! Observability module for the signal relay.
//!
//! # Privacy by Default
//!
//! Actor loops and connection tasks use `#[instrument(skip_all)]` with explicit
//! fields. Signal payloads are never logged, only their size. Metric labels
//! are bounded; room, connection and user ids never appear as labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `relay_connections_active` | Gauge | none | Live WebSocket connections |
//! | `relay_rooms_active` | Gauge | none | Non-empty rooms |
//! | `relay_events_broadcast_total` | Counter | `event_type` | Fan-outs by event |
//! | `relay_deliveries_failed_total` | Counter | `reason` | Per-recipient failures |
//! | `relay_client_messages_total` | Counter | `message_type` | Inbound frames |
//! | `relay_signals_total` | Counter | `signal_type` | Relayed signals by kind |
//! | `relay_registry_latency_seconds` | Histogram | `operation` | Registry message handling time |
//! | `relay_errors_total` | Counter | `code` | Rejected requests |
//! | `relay_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `relay_actor_panics_total` | Counter | `actor_type` | Bugs |

pub mod health;
pub mod metrics;

// Re-exports for convenience
pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
