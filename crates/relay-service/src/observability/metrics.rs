//! Metrics definitions for the signal relay.
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `event_type`: 4 values (peer_joined, signal_received, peer_left, error)
//! - `message_type`: 3 values (join_room, send_signal, leave_room) plus `invalid`
//! - `signal_type`: 4 values (offer, answer, candidate, other)
//! - `reason`: 2 values (queue_full, closed)
//! - `operation`: 8 values (one per registry message)
//! - `code`: bounded by `RelayError` variants
//!
//! Room ids, connection ids and user ids are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Registry operations never
/// touch the network, so the latency buckets sit well below a millisecond.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("relay_registry".to_string()),
            &[
                0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.002_5, 0.005, 0.010, 0.025, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set registry latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Gauges
// ============================================================================

/// Set the number of live connections.
///
/// Metric: `relay_connections_active`
pub fn set_connections_active(count: usize) {
    // usize to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_connections_active").set(count as f64);
}

/// Set the number of non-empty rooms.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `relay_actor_mailbox_depth`
/// Labels: `actor_type` (registry, connection)
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Fan-out
// ============================================================================

/// Record one broadcast of an event into a room.
///
/// Metric: `relay_events_broadcast_total`
/// Labels: `event_type`
pub fn record_event_broadcast(event_type: &'static str) {
    counter!("relay_events_broadcast_total", "event_type" => event_type).increment(1);
}

/// Record a delivery that could not be queued for one recipient.
///
/// Metric: `relay_deliveries_failed_total`
/// Labels: `reason` (queue_full, closed)
///
/// `queue_full` also means the recipient was evicted.
pub fn record_delivery_failed(reason: &'static str) {
    counter!("relay_deliveries_failed_total", "reason" => reason).increment(1);
}

// ============================================================================
// Inbound traffic
// ============================================================================

/// Record a frame received from a client.
///
/// Metric: `relay_client_messages_total`
/// Labels: `message_type`
pub fn record_client_message(message_type: &'static str) {
    counter!("relay_client_messages_total", "message_type" => message_type).increment(1);
}

/// Record a relayed signal by the client's kind hint.
///
/// Metric: `relay_signals_total`
/// Labels: `signal_type`
pub fn record_signal(signal_type: &'static str) {
    counter!("relay_signals_total", "signal_type" => signal_type).increment(1);
}

// ============================================================================
// Latency
// ============================================================================

/// Record time spent handling one registry message.
///
/// Metric: `relay_registry_latency_seconds`
/// Labels: `operation`
pub fn record_registry_latency(operation: &'static str, duration: Duration) {
    histogram!("relay_registry_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Errors
// ============================================================================

/// Record a request rejected with an error event.
///
/// Metric: `relay_errors_total`
/// Labels: `code`
pub fn record_error(code: &'static str) {
    counter!("relay_errors_total", "code" => code).increment(1);
}

/// Record an actor or connection task panic.
///
/// Metric: `relay_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug.
pub fn record_actor_panic(actor_type: &str) {
    counter!("relay_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // These tests exercise the recording functions against whatever global
    // recorder is installed (a no-op one if none). Values are checked in
    // `test_recorded_metrics_appear_in_snapshot`.

    #[test]
    fn test_gauges() {
        set_connections_active(0);
        set_connections_active(10_000);
        set_rooms_active(0);
        set_rooms_active(42);
        set_actor_mailbox_depth("registry", 3);
        set_actor_mailbox_depth("connection", 200);
    }

    #[test]
    fn test_fan_out_counters() {
        for event_type in ["peer_joined", "signal_received", "peer_left", "error"] {
            record_event_broadcast(event_type);
        }
        record_delivery_failed("queue_full");
        record_delivery_failed("closed");
    }

    #[test]
    fn test_inbound_counters() {
        record_client_message("join_room");
        record_client_message("send_signal");
        record_client_message("leave_room");
        record_client_message("invalid");
        for signal_type in ["offer", "answer", "candidate", "other"] {
            record_signal(signal_type);
        }
    }

    #[test]
    fn test_latency_and_errors() {
        record_registry_latency("join_room", Duration::from_micros(40));
        record_registry_latency("disconnect", Duration::from_millis(2));
        record_error("invalid_room_id");
        record_error("connection_not_found");
        record_actor_panic("connection");
    }

    #[test]
    fn test_recorded_metrics_appear_in_snapshot() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_connections_active(2);
            set_rooms_active(1);
            record_event_broadcast("peer_joined");
            record_event_broadcast("peer_joined");
            record_delivery_failed("queue_full");
            record_client_message("join_room");
            record_signal("offer");
            record_registry_latency("join_room", Duration::from_micros(15));
            record_error("draining");
        });

        let metrics = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            metrics
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(_, _, _, value)| value.clone())
        };

        assert!(matches!(
            find("relay_events_broadcast_total"),
            Some(DebugValue::Counter(2))
        ));
        assert!(matches!(
            find("relay_deliveries_failed_total"),
            Some(DebugValue::Counter(1))
        ));
        assert!(find("relay_connections_active").is_some());
        assert!(find("relay_rooms_active").is_some());
        assert!(find("relay_client_messages_total").is_some());
        assert!(find("relay_signals_total").is_some());
        assert!(find("relay_registry_latency_seconds").is_some());
        assert!(find("relay_errors_total").is_some());
    }
}
