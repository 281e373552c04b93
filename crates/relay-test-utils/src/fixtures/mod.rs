//! Test data for relay tests.

use relay_service::actors::{ActorMetrics, RegistrySettings, RoomRegistryActorHandle};
use relay_service::config::Config;
use std::time::Duration;
use uuid::Uuid;

/// How long `next_event` waits before failing a test.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `expect_no_event` listens for a stray event.
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// A room name no other test uses.
#[must_use]
pub fn unique_room() -> String {
    format!("room-{}", Uuid::new_v4())
}

/// A trimmed SDP offer as a browser would serialize it.
#[must_use]
pub fn sdp_offer() -> String {
    r#"{"type":"offer","sdp":"v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"}"#
        .to_string()
}

/// A matching SDP answer.
#[must_use]
pub fn sdp_answer() -> String {
    r#"{"type":"answer","sdp":"v=0\r\no=- 7812290129730101562 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"}"#
        .to_string()
}

/// A host ICE candidate.
#[must_use]
pub fn ice_candidate() -> String {
    r#"{"candidate":"candidate:842163049 1 udp 1677729535 192.0.2.10 53705 typ srflx","sdpMid":"0","sdpMLineIndex":0}"#
        .to_string()
}

/// Default registry settings with a recognizable relay id.
#[must_use]
pub fn test_settings() -> RegistrySettings {
    RegistrySettings {
        relay_id: "relay-test".to_string(),
        ..RegistrySettings::default()
    }
}

/// Spawn a registry actor with [`test_settings`].
#[must_use]
pub fn test_registry() -> RoomRegistryActorHandle {
    registry_with(test_settings())
}

/// Spawn a registry actor with custom settings.
#[must_use]
pub fn registry_with(settings: RegistrySettings) -> RoomRegistryActorHandle {
    RoomRegistryActorHandle::new(settings, ActorMetrics::new())
}

/// Config suitable for an end-to-end server: short keepalive so timeouts are
/// observable in tests.
#[must_use]
pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        relay_id: "relay-test".to_string(),
        keepalive_interval: Duration::from_secs(1),
        client_timeout: Duration::from_secs(3),
        ..Config::default()
    }
}
