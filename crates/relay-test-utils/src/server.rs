//! End-to-end harness: the real router on an ephemeral port.

use crate::fixtures::{EVENT_TIMEOUT, QUIET_PERIOD};

use futures_util::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use relay_service::actors::{ActorMetrics, RegistrySettings, RoomRegistryActorHandle};
use relay_service::config::Config;
use relay_service::observability::HealthState;
use relay_service::routes::{build_routes, AppState};
use relay_service::signaling::{ServerEvent, TransportSettings};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A running relay. Stops when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: RoomRegistryActorHandle,
    pub health: Arc<HealthState>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serve the full router for `config` on 127.0.0.1 with an ephemeral port.
    pub async fn spawn(config: Config) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("no local addr");

        let metrics = ActorMetrics::new();
        let registry =
            RoomRegistryActorHandle::new(RegistrySettings::from(&config), Arc::clone(&metrics));
        let health = Arc::new(HealthState::new());
        let state = Arc::new(AppState {
            registry: registry.clone(),
            metrics,
            transport: TransportSettings::from(&config),
            health: Arc::clone(&health),
        });

        // Each server gets its own, uninstalled recorder handle
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = build_routes(state, metrics_handle, &config.cors_allowed_origins);

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server failed");
        });
        health.set_ready();

        Self {
            addr,
            registry,
            health,
            task,
        }
    }

    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
        self.registry.cancel();
    }
}

/// A real WebSocket client speaking the relay's JSON protocol.
pub struct WsTestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    pub async fn connect(url: &str) -> Self {
        let (stream, _response) = connect_async(url)
            .await
            .expect("WebSocket handshake failed");
        Self { stream }
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .expect("send failed");
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    pub async fn join(&mut self, room_id: &str, user_id: &str) {
        self.send_json(json!({
            "type": "join_room",
            "room_id": room_id,
            "user_id": user_id,
        }))
        .await;
    }

    pub async fn signal(&mut self, room_id: &str, user_id: &str, signal_data: &str) {
        self.send_json(json!({
            "type": "send_signal",
            "room_id": room_id,
            "user_id": user_id,
            "signal_data": signal_data,
        }))
        .await;
    }

    pub async fn leave(&mut self, room_id: &str) {
        self.send_json(json!({ "type": "leave_room", "room_id": room_id }))
            .await;
    }

    /// Next relay event, skipping keepalive frames.
    pub async fn next_event(&mut self) -> ServerEvent {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<ServerEvent>(&text)
                            .unwrap_or_else(|e| panic!("undecodable event {text}: {e}"));
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    other => panic!("expected an event, got {other:?}"),
                }
            }
        })
        .await
        .expect("no event within timeout")
    }

    /// Fail if a relay event arrives within [`QUIET_PERIOD`].
    pub async fn expect_no_event(&mut self) {
        let deadline = tokio::time::Instant::now() + QUIET_PERIOD;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return,
                Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
                Ok(other) => panic!("unexpected frame {other:?}"),
            }
        }
    }

    /// Wait for a server ping, skipping anything else.
    ///
    /// Reading is what lets tungstenite answer pings, so a client that never
    /// calls this (or another read) looks idle to the server.
    pub async fn wait_for_ping(&mut self, within: Duration) {
        tokio::time::timeout(within, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Ping(_))) => return,
                    Some(Ok(_)) => {}
                    other => panic!("connection ended before a ping: {other:?}"),
                }
            }
        })
        .await
        .expect("no ping within timeout");
    }

    /// Read until the server closes, returning its close frame.
    pub async fn wait_for_close(&mut self, within: Duration) -> Option<CloseFrame<'static>> {
        tokio::time::timeout(within, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(frame))) => return frame,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => return None,
                }
            }
        })
        .await
        .expect("server did not close the connection")
    }

    /// Close from the client side.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
