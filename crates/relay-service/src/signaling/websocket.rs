//! WebSocket transport: one task per client connection.
//!
//! # Lifecycle
//!
//! 1. Upgrade, generate a `ConnectionId`, register with the registry
//! 2. Split the socket: a writer task drains the outbound queue and sends
//!    keepalive pings; the reader loop decodes frames and calls the registry
//! 3. The loop ends on client close, read error, idle timeout, writer failure
//!    or cancellation (eviction or shutdown)
//! 4. `disconnect` is called on every exit path, including a panic inside
//!    the connection task

use crate::actors::{
    outbound_channel, ActorMetrics, ActorType, ConnectionHandle, Delivery, OutboundQueue,
    RoomRegistryActorHandle,
};
use crate::config::Config;
use crate::errors::RelayError;
use crate::observability::metrics as relay_metrics;

use super::protocol::{ClientMessage, ServerEvent, SignalKind};

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use common::types::ConnectionId;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Per-connection transport limits.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    /// Outbound queue capacity before the peer is evicted.
    pub outbound_queue_capacity: usize,
    /// Interval between server pings.
    pub keepalive_interval: Duration,
    /// Close after this long without any inbound frame.
    pub client_timeout: Duration,
    /// Largest accepted inbound message.
    pub max_message_bytes: usize,
}

impl From<&Config> for TransportSettings {
    fn from(config: &Config) -> Self {
        Self {
            outbound_queue_capacity: config.outbound_queue_capacity,
            keepalive_interval: config.keepalive_interval,
            client_timeout: config.client_timeout,
            max_message_bytes: config.max_message_bytes,
        }
    }
}

/// Why a connection task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from the socket failed (includes oversized frames).
    ReadError,
    /// Nothing received within the client timeout.
    IdleTimeout,
    /// Writing to the socket failed.
    WriteError,
    /// Evicted as a slow consumer, or the relay is shutting down.
    Cancelled,
}

impl CloseReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::ReadError => "read_error",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::WriteError => "write_error",
            CloseReason::Cancelled => "cancelled",
        }
    }

    /// Close frame sent to the client, if the socket is still writable.
    fn close_frame(self) -> Option<CloseFrame<'static>> {
        let code = match self {
            CloseReason::ClientClosed | CloseReason::ReadError | CloseReason::WriteError => {
                return None
            }
            CloseReason::IdleTimeout => close_code::POLICY,
            CloseReason::Cancelled => close_code::AWAY,
        };
        Some(CloseFrame {
            code,
            reason: Cow::Borrowed(self.as_str()),
        })
    }
}

/// Serve one upgraded WebSocket until it closes.
pub async fn serve_socket(
    socket: WebSocket,
    registry: RoomRegistryActorHandle,
    metrics: Arc<ActorMetrics>,
    settings: TransportSettings,
) {
    let connection_id = ConnectionId::generate();
    let cancel_token = CancellationToken::new();
    let (handle, queue) = outbound_channel(
        connection_id.clone(),
        settings.outbound_queue_capacity,
        cancel_token.clone(),
    );

    if let Err(e) = registry.register_connection(handle.clone()).await {
        warn!(
            target: "relay.ws",
            connection_id = %connection_id,
            error = %e,
            "Connection rejected"
        );
        relay_metrics::record_error(e.code_label());
        reject(socket, &e).await;
        return;
    }

    info!(target: "relay.ws", connection_id = %connection_id, "Connection opened");

    let task: JoinHandle<CloseReason> = tokio::spawn(run_connection(
        socket,
        connection_id.clone(),
        registry.clone(),
        handle,
        queue,
        cancel_token.clone(),
        settings,
    ));

    match task.await {
        Ok(reason) => {
            info!(
                target: "relay.ws",
                connection_id = %connection_id,
                reason = reason.as_str(),
                "Connection closed"
            );
        }
        Err(join_error) => {
            if join_error.is_panic() {
                error!(
                    target: "relay.ws",
                    connection_id = %connection_id,
                    error = ?join_error,
                    "Connection task panicked - indicates bug"
                );
                metrics.record_panic(ActorType::Connection);
            }
        }
    }

    cancel_token.cancel();
    if let Err(e) = registry.disconnect(&connection_id).await {
        warn!(
            target: "relay.ws",
            connection_id = %connection_id,
            error = %e,
            "Disconnect failed"
        );
    }
}

/// Tell a client why it could not be registered, then close.
async fn reject(mut socket: WebSocket, err: &RelayError) {
    if let Ok(text) = ServerEvent::from_error(err).encode() {
        let _ = socket.send(Message::Text(text)).await;
    }
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::AGAIN,
            reason: Cow::Owned(err.client_message()),
        })))
        .await;
}

#[instrument(skip_all, name = "relay.ws.connection", fields(connection_id = %connection_id))]
async fn run_connection(
    socket: WebSocket,
    connection_id: ConnectionId,
    registry: RoomRegistryActorHandle,
    reply: ConnectionHandle,
    queue: OutboundQueue,
    cancel_token: CancellationToken,
    settings: TransportSettings,
) -> CloseReason {
    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(
        sink,
        queue,
        cancel_token.clone(),
        settings.keepalive_interval,
    ));
    let mut writer_result = None;

    let reason = loop {
        tokio::select! {
            () = cancel_token.cancelled() => break CloseReason::Cancelled,

            result = &mut writer => {
                writer_result = Some(result);
                break CloseReason::WriteError;
            }

            frame = tokio::time::timeout(settings.client_timeout, stream.next()) => {
                match frame {
                    Err(_) => break CloseReason::IdleTimeout,
                    Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break CloseReason::ClientClosed,
                    Ok(Some(Err(e))) => {
                        debug!(
                            target: "relay.ws",
                            connection_id = %connection_id,
                            error = %e,
                            "Read failed"
                        );
                        break CloseReason::ReadError;
                    }
                    Ok(Some(Ok(Message::Text(text)))) => {
                        handle_text(&registry, &connection_id, &reply, &text).await;
                    }
                    Ok(Some(Ok(Message::Binary(_)))) => {
                        relay_metrics::record_client_message("invalid");
                        send_error(
                            &connection_id,
                            &reply,
                            &RelayError::InvalidMessage("binary frames are not supported".to_string()),
                        );
                    }
                    // Pings are answered by the socket itself; pongs only refresh the idle timer.
                    Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
                }
            }
        }
    };

    // Stop the writer and take the sink back to send a close frame.
    cancel_token.cancel();
    let writer_result = match writer_result {
        Some(result) => result,
        None => writer.await,
    };

    if let (Ok(Ok(mut sink)), Some(frame)) = (writer_result, reason.close_frame()) {
        let _ = sink.send(Message::Close(Some(frame))).await;
    }

    reason
}

/// Drain the outbound queue onto the socket and send keepalive pings.
///
/// Returns the sink on cancellation so the caller can send a close frame.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: OutboundQueue,
    cancel_token: CancellationToken,
    keepalive_interval: Duration,
) -> Result<SplitSink<WebSocket, Message>, axum::Error> {
    let mut keepalive =
        tokio::time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => return Ok(sink),

            _ = keepalive.tick() => {
                sink.send(Message::Ping(Vec::new())).await?;
            }

            event = queue.recv() => {
                let Some(event) = event else {
                    return Ok(sink);
                };
                match event.encode() {
                    Ok(text) => sink.send(Message::Text(text)).await?,
                    Err(e) => {
                        warn!(
                            target: "relay.ws",
                            event_type = event.event_type(),
                            error = %e,
                            "Failed to encode event, dropping"
                        );
                    }
                }
            }
        }
    }
}

/// Decode one client frame and apply it to the registry.
async fn handle_text(
    registry: &RoomRegistryActorHandle,
    connection_id: &ConnectionId,
    reply: &ConnectionHandle,
    text: &str,
) {
    let result = match ClientMessage::decode(text) {
        Ok(message) => {
            relay_metrics::record_client_message(message.message_type());
            dispatch(registry, connection_id, message).await
        }
        Err(e) => {
            relay_metrics::record_client_message("invalid");
            Err(e)
        }
    };

    if let Err(e) = result {
        send_error(connection_id, reply, &e);
    }
}

async fn dispatch(
    registry: &RoomRegistryActorHandle,
    connection_id: &ConnectionId,
    message: ClientMessage,
) -> Result<(), RelayError> {
    match message {
        ClientMessage::JoinRoom { room_id, user_id } => registry
            .join_room(&room_id, connection_id, user_id)
            .await
            .map(|_| ()),

        ClientMessage::SendSignal {
            room_id,
            user_id,
            signal_data,
            signal_type,
        } => registry
            .relay_signal(
                &room_id,
                connection_id,
                user_id,
                signal_data,
                SignalKind::from_hint(signal_type.as_deref()),
            )
            .await
            .map(|_| ()),

        ClientMessage::LeaveRoom { room_id } => registry
            .leave_room(&room_id, connection_id)
            .await
            .map(|_| ()),
    }
}

/// Queue an `error` event for the requesting connection only.
fn send_error(connection_id: &ConnectionId, reply: &ConnectionHandle, err: &RelayError) {
    relay_metrics::record_error(err.code_label());
    debug!(
        target: "relay.ws",
        connection_id = %connection_id,
        error = %err,
        "Request rejected"
    );

    if reply.deliver(Arc::new(ServerEvent::from_error(err))) == Delivery::QueueFull {
        reply.evict();
    }
}
