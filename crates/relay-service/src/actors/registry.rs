//! `RoomRegistryActor` - process-wide owner of rooms and live connections.
//!
//! The registry is a singleton actor. Every read-modify-write of membership is
//! a [`RegistryMessage`] processed one at a time, so:
//!
//! - two concurrent joins into the same room cannot lose an entry
//! - every member of a room observes that room's events in submission order
//! - a join that arrives after its connection's disconnect is rejected
//!   instead of resurrecting the membership
//!
//! Fan-out never awaits. Each event is wrapped in an `Arc` and handed to every
//! recipient's bounded outbound queue with `try_send`; see
//! [`super::connection`] for the eviction rule.

use crate::config::{
    Config, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_ROOM_MEMBERS, DEFAULT_RELAY_ID_PREFIX,
};
use crate::errors::RelayError;
use crate::observability::metrics as relay_metrics;
use crate::signaling::protocol::{ServerEvent, SignalKind};

use super::connection::{ConnectionHandle, Delivery};
use super::messages::{
    DisconnectOutcome, JoinOutcome, LeaveOutcome, MemberInfo, RegistryMessage, RegistryStatus,
    RoomInfo, SignalOutcome,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::Room;

use common::types::{ConnectionId, RoomId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Registry limits and behavior switches.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Relay instance id (logs and status only).
    pub relay_id: String,
    /// Maximum live connections.
    pub max_connections: usize,
    /// Maximum members in one room.
    pub max_room_members: usize,
    /// Deliver `signal_received` back to the sender as well.
    pub echo_signals_to_sender: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            relay_id: format!("{DEFAULT_RELAY_ID_PREFIX}-local"),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_room_members: DEFAULT_MAX_ROOM_MEMBERS,
            echo_signals_to_sender: true,
        }
    }
}

impl From<&Config> for RegistrySettings {
    fn from(config: &Config) -> Self {
        Self {
            relay_id: config.relay_id.clone(),
            max_connections: config.max_connections,
            max_room_members: config.max_room_members,
            echo_signals_to_sender: config.echo_signals_to_sender,
        }
    }
}

/// Handle to the `RoomRegistryActor`.
///
/// Cheap to clone. All methods are async and return results via oneshot
/// channels. Room ids are validated here, before anything reaches the actor.
#[derive(Clone, Debug)]
pub struct RoomRegistryActorHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl RoomRegistryActorHandle {
    /// Spawn the registry actor and return a handle to it.
    #[must_use]
    pub fn new(settings: RegistrySettings, metrics: Arc<ActorMetrics>) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Registry,
            settings.relay_id.as_str(),
        ));

        let actor = RoomRegistryActor::new(
            settings,
            receiver,
            cancel_token.clone(),
            metrics,
            Arc::clone(&mailbox),
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            mailbox,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;
        self.mailbox.record_enqueue();

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Make a connection live.
    pub async fn register_connection(&self, connection: ConnectionHandle) -> Result<(), RelayError> {
        self.request(move |respond_to| RegistryMessage::RegisterConnection {
            connection,
            respond_to,
        })
        .await?
    }

    /// Join a room and announce `peer_joined` to every member, joiner included.
    pub async fn join_room(
        &self,
        room_id: &str,
        connection_id: &ConnectionId,
        user_id: UserId,
    ) -> Result<JoinOutcome, RelayError> {
        let room_id = RoomId::parse(room_id)?;
        let connection_id = connection_id.clone();
        self.request(move |respond_to| RegistryMessage::JoinRoom {
            room_id,
            connection_id,
            user_id,
            respond_to,
        })
        .await?
    }

    /// Relay a signaling payload to every member of a room.
    pub async fn relay_signal(
        &self,
        room_id: &str,
        connection_id: &ConnectionId,
        from_user_id: UserId,
        signal_data: String,
        kind: SignalKind,
    ) -> Result<SignalOutcome, RelayError> {
        let room_id = RoomId::parse(room_id)?;
        let connection_id = connection_id.clone();
        self.request(move |respond_to| RegistryMessage::RelaySignal {
            room_id,
            connection_id,
            from_user_id,
            signal_data,
            signal_type: kind.as_str(),
            respond_to,
        })
        .await?
    }

    /// Leave one room.
    pub async fn leave_room(
        &self,
        room_id: &str,
        connection_id: &ConnectionId,
    ) -> Result<LeaveOutcome, RelayError> {
        let room_id = RoomId::parse(room_id)?;
        let connection_id = connection_id.clone();
        self.request(move |respond_to| RegistryMessage::LeaveRoom {
            room_id,
            connection_id,
            respond_to,
        })
        .await?
    }

    /// Remove a connection from every room. Unknown ids are a no-op.
    pub async fn disconnect(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<DisconnectOutcome, RelayError> {
        let connection_id = connection_id.clone();
        self.request(move |respond_to| RegistryMessage::Disconnect {
            connection_id,
            respond_to,
        })
        .await
    }

    /// Snapshot a room. `None` for rooms with no members.
    pub async fn get_room(&self, room_id: &str) -> Result<Option<RoomInfo>, RelayError> {
        let room_id = RoomId::parse(room_id)?;
        self.request(move |respond_to| RegistryMessage::GetRoom {
            room_id,
            respond_to,
        })
        .await
    }

    /// Snapshot registry counters.
    pub async fn get_status(&self) -> Result<RegistryStatus, RelayError> {
        self.request(|respond_to| RegistryMessage::GetStatus { respond_to })
            .await
    }

    /// Start draining: refuse new connections and close the live ones.
    ///
    /// The actor keeps running so closing connections can still disconnect.
    pub async fn shutdown(&self) -> Result<usize, RelayError> {
        self.request(|respond_to| RegistryMessage::Shutdown { respond_to })
            .await
    }

    /// Stop the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// A registered connection and the rooms it is in, in join order.
struct LiveConnection {
    handle: ConnectionHandle,
    rooms: Vec<RoomId>,
}

/// The `RoomRegistryActor` implementation.
pub struct RoomRegistryActor {
    settings: RegistrySettings,
    receiver: mpsc::Receiver<RegistryMessage>,
    cancel_token: CancellationToken,
    /// Live connections, with the reverse room index.
    connections: HashMap<ConnectionId, LiveConnection>,
    /// Non-empty rooms.
    rooms: HashMap<RoomId, Room>,
    /// False once draining has started.
    accepting_new: bool,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl RoomRegistryActor {
    fn new(
        settings: RegistrySettings,
        receiver: mpsc::Receiver<RegistryMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        mailbox: Arc<MailboxMonitor>,
    ) -> Self {
        Self {
            settings,
            receiver,
            cancel_token,
            connections: HashMap::new(),
            rooms: HashMap::new(),
            accepting_new: true,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.actor.registry", fields(relay_id = %self.settings.relay_id))]
    async fn run(mut self) {
        info!(
            target: "relay.actor.registry",
            relay_id = %self.settings.relay_id,
            max_connections = self.settings.max_connections,
            max_room_members = self.settings.max_room_members,
            "RoomRegistryActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor.registry",
                        relay_id = %self.settings.relay_id,
                        "RoomRegistryActor received cancellation signal"
                    );
                    self.accepting_new = false;
                    self.evict_all();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            let operation = message.operation();
                            let start = Instant::now();
                            self.handle_message(message);
                            relay_metrics::record_registry_latency(operation, start.elapsed());

                            self.mailbox.record_dequeue();
                            relay_metrics::set_actor_mailbox_depth(
                                ActorType::Registry.as_str(),
                                self.mailbox.current_depth(),
                            );
                        }
                        None => {
                            info!(
                                target: "relay.actor.registry",
                                relay_id = %self.settings.relay_id,
                                "RoomRegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "relay.actor.registry",
            relay_id = %self.settings.relay_id,
            rooms_remaining = self.rooms.len(),
            connections_remaining = self.connections.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomRegistryActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::RegisterConnection {
                connection,
                respond_to,
            } => {
                let result = self.register_connection(connection);
                let _ = respond_to.send(result);
            }

            RegistryMessage::JoinRoom {
                room_id,
                connection_id,
                user_id,
                respond_to,
            } => {
                let result = self.join_room(room_id, connection_id, user_id);
                let _ = respond_to.send(result);
            }

            RegistryMessage::RelaySignal {
                room_id,
                connection_id,
                from_user_id,
                signal_data,
                signal_type,
                respond_to,
            } => {
                let result = self.relay_signal(
                    room_id,
                    connection_id,
                    from_user_id,
                    signal_data,
                    signal_type,
                );
                let _ = respond_to.send(result);
            }

            RegistryMessage::LeaveRoom {
                room_id,
                connection_id,
                respond_to,
            } => {
                let result = self.leave_room(&room_id, &connection_id);
                let _ = respond_to.send(result);
            }

            RegistryMessage::Disconnect {
                connection_id,
                respond_to,
            } => {
                let outcome = self.disconnect(&connection_id);
                let _ = respond_to.send(outcome);
            }

            RegistryMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.get_room(&room_id));
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::Shutdown { respond_to } => {
                let _ = respond_to.send(self.begin_drain());
            }
        }
    }

    fn register_connection(&mut self, connection: ConnectionHandle) -> Result<(), RelayError> {
        if !self.accepting_new {
            return Err(RelayError::Draining);
        }

        let connection_id = connection.connection_id().clone();
        if self.connections.contains_key(&connection_id) {
            return Err(RelayError::Conflict(
                "Connection already registered".to_string(),
            ));
        }

        if self.connections.len() >= self.settings.max_connections {
            warn!(
                target: "relay.actor.registry",
                relay_id = %self.settings.relay_id,
                max_connections = self.settings.max_connections,
                "Connection limit reached, rejecting"
            );
            return Err(RelayError::RelayCapacityExceeded);
        }

        self.connections.insert(
            connection_id.clone(),
            LiveConnection {
                handle: connection,
                rooms: Vec::new(),
            },
        );
        self.metrics.connection_created();
        relay_metrics::set_connections_active(self.connections.len());

        debug!(
            target: "relay.actor.registry",
            connection_id = %connection_id,
            total_connections = self.connections.len(),
            "Connection registered"
        );

        Ok(())
    }

    fn join_room(
        &mut self,
        room_id: RoomId,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> Result<JoinOutcome, RelayError> {
        let Some(live) = self.connections.get_mut(&connection_id) else {
            return Err(RelayError::ConnectionNotFound(connection_id.to_string()));
        };

        let existing = self.rooms.get(&room_id);
        let already_member = existing.is_some_and(|room| room.contains(&connection_id));
        if !already_member && existing.map_or(0, Room::len) >= self.settings.max_room_members {
            return Err(RelayError::RoomCapacityExceeded(room_id.to_string()));
        }

        if !live.rooms.contains(&room_id) {
            live.rooms.push(room_id.clone());
        }

        let created = !self.rooms.contains_key(&room_id);
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));
        let newly_added = room.add_member(connection_id.clone(), user_id.clone());
        let member_count = room.len();

        if created {
            self.metrics.room_created();
            relay_metrics::set_rooms_active(self.rooms.len());
        }

        let recipients = self.broadcast(
            &room_id,
            ServerEvent::PeerJoined {
                room_id: room_id.clone(),
                user_id,
                connection_id: connection_id.clone(),
            },
            None,
        );

        info!(
            target: "relay.actor.registry",
            room_id = %room_id,
            connection_id = %connection_id,
            newly_added,
            member_count,
            recipients,
            "Connection joined room"
        );

        Ok(JoinOutcome {
            newly_added,
            recipients,
            member_count,
        })
    }

    fn relay_signal(
        &mut self,
        room_id: RoomId,
        connection_id: ConnectionId,
        from_user_id: UserId,
        signal_data: String,
        signal_type: &'static str,
    ) -> Result<SignalOutcome, RelayError> {
        if !self.connections.contains_key(&connection_id) {
            return Err(RelayError::ConnectionNotFound(connection_id.to_string()));
        }

        relay_metrics::record_signal(signal_type);
        let payload_bytes = signal_data.len();

        let skip = (!self.settings.echo_signals_to_sender).then_some(&connection_id);
        let recipients = self.broadcast(
            &room_id,
            ServerEvent::SignalReceived {
                room_id: room_id.clone(),
                sender_connection_id: connection_id.clone(),
                from_user_id,
                signal_data,
            },
            skip,
        );

        debug!(
            target: "relay.actor.registry",
            room_id = %room_id,
            connection_id = %connection_id,
            signal_type,
            payload_bytes,
            recipients,
            "Signal relayed"
        );

        Ok(SignalOutcome { recipients })
    }

    fn leave_room(
        &mut self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<LeaveOutcome, RelayError> {
        let Some(live) = self.connections.get_mut(connection_id) else {
            return Err(RelayError::ConnectionNotFound(connection_id.to_string()));
        };
        live.rooms.retain(|r| r != room_id);

        let was_member = self
            .rooms
            .get_mut(room_id)
            .is_some_and(|room| room.remove_member(connection_id));
        if !was_member {
            return Ok(LeaveOutcome {
                was_member: false,
                recipients: 0,
                room_removed: false,
            });
        }

        let (recipients, room_removed) = self.announce_departure(room_id, connection_id);

        info!(
            target: "relay.actor.registry",
            room_id = %room_id,
            connection_id = %connection_id,
            recipients,
            room_removed,
            "Connection left room"
        );

        Ok(LeaveOutcome {
            was_member,
            recipients,
            room_removed,
        })
    }

    fn disconnect(&mut self, connection_id: &ConnectionId) -> DisconnectOutcome {
        let Some(live) = self.connections.remove(connection_id) else {
            debug!(
                target: "relay.actor.registry",
                connection_id = %connection_id,
                "Disconnect for unknown connection, ignoring"
            );
            return DisconnectOutcome::default();
        };
        self.metrics.connection_closed();
        relay_metrics::set_connections_active(self.connections.len());

        // Leave every room first, then announce.
        let mut rooms_left = Vec::with_capacity(live.rooms.len());
        for room_id in live.rooms {
            let removed = self
                .rooms
                .get_mut(&room_id)
                .is_some_and(|room| room.remove_member(connection_id));
            if removed {
                rooms_left.push(room_id);
            } else {
                warn!(
                    target: "relay.actor.registry",
                    room_id = %room_id,
                    connection_id = %connection_id,
                    "Room index out of sync with membership"
                );
            }
        }

        let mut recipients = 0;
        for room_id in &rooms_left {
            recipients += self.announce_departure(room_id, connection_id).0;
        }

        info!(
            target: "relay.actor.registry",
            connection_id = %connection_id,
            rooms_left = rooms_left.len(),
            recipients,
            total_connections = self.connections.len(),
            "Connection disconnected"
        );

        DisconnectOutcome {
            was_registered: true,
            rooms_left,
            recipients,
        }
    }

    /// After a member was removed: drop the room if it is now empty,
    /// otherwise broadcast `peer_left` to the remaining members.
    ///
    /// Returns (recipients, room_removed).
    fn announce_departure(
        &mut self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> (usize, bool) {
        if self.rooms.get(room_id).is_some_and(Room::is_empty) {
            self.rooms.remove(room_id);
            self.metrics.room_removed();
            relay_metrics::set_rooms_active(self.rooms.len());
            debug!(
                target: "relay.actor.registry",
                room_id = %room_id,
                total_rooms = self.rooms.len(),
                "Room empty, removed"
            );
            return (0, true);
        }

        let recipients = self.broadcast(
            room_id,
            ServerEvent::PeerLeft {
                room_id: room_id.clone(),
                connection_id: connection_id.clone(),
            },
            None,
        );
        (recipients, false)
    }

    /// Hand `event` to every current member of `room_id` except `skip`.
    ///
    /// Returns how many recipients it was queued for. A failed recipient
    /// never stops delivery to the others.
    fn broadcast(
        &self,
        room_id: &RoomId,
        event: ServerEvent,
        skip: Option<&ConnectionId>,
    ) -> usize {
        let Some(room) = self.rooms.get(room_id) else {
            return 0;
        };

        let event_type = event.event_type();
        let event = Arc::new(event);
        let mut recipients = 0;

        for member in room.members() {
            if skip == Some(member) {
                continue;
            }

            let delivery = self
                .connections
                .get(member)
                .map_or(Delivery::Closed, |live| live.handle.deliver(Arc::clone(&event)));

            match delivery {
                Delivery::Queued => recipients += 1,
                Delivery::QueueFull => {
                    if let Some(live) = self.connections.get(member) {
                        warn!(
                            target: "relay.actor.registry",
                            room_id = %room_id,
                            connection_id = %member,
                            event_type,
                            queue_depth = live.handle.queue_depth(),
                            "Outbound queue full, evicting slow connection"
                        );
                        live.handle.evict();
                    }
                    self.record_failed_delivery(delivery);
                }
                Delivery::Closed => {
                    debug!(
                        target: "relay.actor.registry",
                        room_id = %room_id,
                        connection_id = %member,
                        event_type,
                        "Recipient closed, skipping"
                    );
                    self.record_failed_delivery(delivery);
                }
            }
        }

        relay_metrics::record_event_broadcast(event_type);
        recipients
    }

    fn record_failed_delivery(&self, delivery: Delivery) {
        self.metrics.record_delivery_failed();
        relay_metrics::record_delivery_failed(delivery.as_str());
    }

    fn get_room(&self, room_id: &RoomId) -> Option<RoomInfo> {
        self.rooms.get(room_id).map(|room| RoomInfo {
            room_id: room.id().clone(),
            created_at: room.created_at(),
            members: room
                .members()
                .iter()
                .map(|connection_id| MemberInfo {
                    connection_id: connection_id.clone(),
                    user_id: room.user_id_of(connection_id).cloned().unwrap_or_default(),
                })
                .collect(),
        })
    }

    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            relay_id: self.settings.relay_id.clone(),
            room_count: self.rooms.len(),
            connection_count: self.connections.len(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    fn begin_drain(&mut self) -> usize {
        info!(
            target: "relay.actor.registry",
            relay_id = %self.settings.relay_id,
            connection_count = self.connections.len(),
            room_count = self.rooms.len(),
            "Draining: closing live connections"
        );
        self.accepting_new = false;
        self.evict_all()
    }

    fn evict_all(&self) -> usize {
        for live in self.connections.values() {
            live.handle.evict();
        }
        self.connections.len()
    }
}
