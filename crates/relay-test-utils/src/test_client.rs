//! A registry-level client for scenario tests.
//!
//! `TestClient` skips the WebSocket entirely: it registers an outbound queue
//! with a registry actor and reads events straight off that queue.

use crate::fixtures::{EVENT_TIMEOUT, QUIET_PERIOD};

use common::types::{ConnectionId, UserId};
use relay_service::actors::{
    outbound_channel, DisconnectOutcome, JoinOutcome, LeaveOutcome, OutboundQueue,
    RoomRegistryActorHandle, SignalOutcome,
};
use relay_service::errors::RelayError;
use relay_service::signaling::{ServerEvent, SignalKind};
use tokio_util::sync::CancellationToken;

/// Default outbound queue capacity for test clients.
pub const TEST_QUEUE_CAPACITY: usize = 64;

/// A live connection registered directly with a registry actor.
pub struct TestClient {
    registry: RoomRegistryActorHandle,
    connection_id: ConnectionId,
    queue: OutboundQueue,
    cancel_token: CancellationToken,
}

impl TestClient {
    /// Register a connection with the default queue capacity.
    pub async fn connect(registry: &RoomRegistryActorHandle, id: &str) -> Self {
        Self::connect_with_capacity(registry, id, TEST_QUEUE_CAPACITY).await
    }

    /// Register a connection with a specific queue capacity.
    pub async fn connect_with_capacity(
        registry: &RoomRegistryActorHandle,
        id: &str,
        capacity: usize,
    ) -> Self {
        let connection_id = ConnectionId::from(id);
        let cancel_token = CancellationToken::new();
        let (handle, queue) = outbound_channel(connection_id.clone(), capacity, cancel_token.clone());
        registry
            .register_connection(handle)
            .await
            .expect("register_connection failed");

        Self {
            registry: registry.clone(),
            connection_id,
            queue,
            cancel_token,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Join a room, failing the test on error.
    pub async fn join(&self, room_id: &str, user_id: &str) -> JoinOutcome {
        self.try_join(room_id, user_id).await.expect("join_room failed")
    }

    pub async fn try_join(&self, room_id: &str, user_id: &str) -> Result<JoinOutcome, RelayError> {
        self.registry
            .join_room(room_id, &self.connection_id, UserId::from(user_id))
            .await
    }

    /// Relay a signal, failing the test on error.
    pub async fn signal(&self, room_id: &str, user_id: &str, signal_data: &str) -> SignalOutcome {
        self.registry
            .relay_signal(
                room_id,
                &self.connection_id,
                UserId::from(user_id),
                signal_data.to_string(),
                SignalKind::Other,
            )
            .await
            .expect("relay_signal failed")
    }

    /// Leave a room, failing the test on error.
    pub async fn leave(&self, room_id: &str) -> LeaveOutcome {
        self.registry
            .leave_room(room_id, &self.connection_id)
            .await
            .expect("leave_room failed")
    }

    /// Disconnect, as the transport would when the socket ends.
    pub async fn disconnect(&self) -> DisconnectOutcome {
        self.cancel_token.cancel();
        self.registry
            .disconnect(&self.connection_id)
            .await
            .expect("disconnect failed")
    }

    /// Next queued event, failing the test after [`EVENT_TIMEOUT`].
    pub async fn next_event(&mut self) -> ServerEvent {
        let event = tokio::time::timeout(EVENT_TIMEOUT, self.queue.recv())
            .await
            .unwrap_or_else(|_| panic!("{}: no event within {EVENT_TIMEOUT:?}", self.connection_id))
            .unwrap_or_else(|| panic!("{}: outbound queue closed", self.connection_id));
        (*event).clone()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.queue.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    /// Fail the test if an event arrives within [`QUIET_PERIOD`].
    pub async fn expect_no_event(&mut self) {
        if let Ok(Some(event)) = tokio::time::timeout(QUIET_PERIOD, self.queue.recv()).await {
            panic!("{}: unexpected event {event:?}", self.connection_id);
        }
    }

    /// Whether the registry evicted this connection.
    #[must_use]
    pub fn is_evicted(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
