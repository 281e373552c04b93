//! Signal Relay
//!
//! WebSocket signaling relay for WebRTC peers grouped into rooms.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (text or JSON)
//! 3. Initialize Prometheus metrics recorder
//! 4. Spawn the `RoomRegistryActor`
//! 5. Bind the listener and serve `/ws`, probes, metrics and the status API
//! 6. Wait for shutdown signal
//!
//! # Shutdown Flow
//!
//! 1. Mark not ready so load balancers stop routing new clients here
//! 2. Registry stops accepting connections and closes the live ones
//! 3. Wait (bounded) for every connection to disconnect
//! 4. Stop the registry

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::config::{LogFormat, ObservabilityConfig};
use relay_service::actors::{ActorMetrics, RegistrySettings, RoomRegistryActorHandle};
use relay_service::config::Config;
use relay_service::observability::{init_metrics_recorder, HealthState};
use relay_service::routes::{build_routes, AppState};
use relay_service::signaling::TransportSettings;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on waiting for live connections to disconnect during shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration decides the log format, so it loads before tracing.
    let config = Config::from_env()?;

    init_tracing(&config.observability);

    info!("Starting Signal Relay");
    info!(
        relay_id = %config.relay_id,
        bind_address = %config.bind_address,
        max_connections = config.max_connections,
        max_room_members = config.max_room_members,
        max_message_bytes = config.max_message_bytes,
        outbound_queue_capacity = config.outbound_queue_capacity,
        keepalive_interval_seconds = config.keepalive_interval.as_secs(),
        client_timeout_seconds = config.client_timeout.as_secs(),
        echo_signals_to_sender = config.echo_signals_to_sender,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    info!("Initializing room registry...");
    let actor_metrics = ActorMetrics::new();
    let registry = RoomRegistryActorHandle::new(
        RegistrySettings::from(&config),
        Arc::clone(&actor_metrics),
    );
    info!("Room registry initialized");

    let state = Arc::new(AppState {
        registry: registry.clone(),
        metrics: Arc::clone(&actor_metrics),
        transport: TransportSettings::from(&config),
        health: Arc::clone(&health_state),
    });
    let app = build_routes(state, prometheus_handle, &config.cors_allowed_origins);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    // Bind before marking ready to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind listener");
        format!("Failed to bind {addr}: {e}")
    })?;
    health_state.set_ready();
    info!(addr = %addr, "Signal Relay listening - press Ctrl+C to shutdown");

    let drain_health = Arc::clone(&health_state);
    let drain_registry = registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, initiating graceful shutdown...");

            // Mark as not ready immediately so no new clients are routed here
            drain_health.set_not_ready();

            match drain_registry.shutdown().await {
                Ok(closing) => info!(connections = closing, "Closing live connections"),
                Err(e) => warn!(error = %e, "Registry drain request failed"),
            }
        })
        .await?;

    wait_for_drain(&registry).await;
    registry.cancel();

    info!(
        connections_remaining = actor_metrics.connection_count(),
        rooms_remaining = actor_metrics.room_count(),
        deliveries_failed = actor_metrics.delivery_failures(),
        "Signal Relay shutdown complete"
    );
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured default filter.
fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| observability.log_filter.as_str().into());
    let json = observability.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Wait until every connection has disconnected, or `DRAIN_TIMEOUT` passes.
async fn wait_for_drain(registry: &RoomRegistryActorHandle) {
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;

    loop {
        match registry.get_status().await {
            Ok(status) if status.connection_count == 0 => {
                info!("All connections drained");
                return;
            }
            Ok(status) if tokio::time::Instant::now() >= deadline => {
                warn!(
                    connections_remaining = status.connection_count,
                    timeout_secs = DRAIN_TIMEOUT.as_secs(),
                    "Drain timed out"
                );
                return;
            }
            Ok(_) => tokio::time::sleep(DRAIN_POLL_INTERVAL).await,
            Err(e) => {
                warn!(error = %e, "Registry unavailable while draining");
                return;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
