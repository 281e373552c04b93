//! Actor metrics and mailbox monitoring.
//!
//! Every mailbox logs when it backs up:
//!
//! | Actor Type | Elevated (debug, once) | Critical (warn) |
//! |------------|------------------------|-----------------|
//! | Registry   | > 500                  | > 2000          |
//! | Connection | > 64                   | > 192           |
//!
//! The registry bound is higher because every connection in the process
//! funnels through the one registry mailbox.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// RoomRegistryActor (singleton).
    Registry,
    /// Per-connection outbound queue and its socket task.
    Connection,
}

impl ActorType {
    /// Returns the actor type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Registry => "registry",
            ActorType::Connection => "connection",
        }
    }

    /// Depth past which a mailbox counts as backed up.
    #[must_use]
    pub const fn elevated_depth(&self) -> usize {
        match self {
            ActorType::Registry => 500,
            ActorType::Connection => 64,
        }
    }

    /// Depth past which every enqueue warns.
    #[must_use]
    pub const fn critical_depth(&self) -> usize {
        match self {
            ActorType::Registry => 2000,
            ActorType::Connection => 192,
        }
    }
}

/// Queue depth tracking for one mailbox.
///
/// The producer calls `record_enqueue` and the consumer `record_dequeue`,
/// possibly from different threads.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Relay id or connection id.
    actor_id: String,
    depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    pub fn record_enqueue(&self) {
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        if depth > self.actor_type.critical_depth() {
            warn!(
                target: "relay.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth,
                threshold = self.actor_type.critical_depth(),
                "Mailbox depth critical"
            );
        } else if depth == self.actor_type.elevated_depth() + 1 {
            debug!(
                target: "relay.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth,
                "Mailbox depth elevated"
            );
        }
    }

    pub fn record_dequeue(&self) {
        // A dequeue can be observed before its enqueue is counted.
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was refused because the mailbox is full.
    pub fn record_drop(&self) {
        let dropped = self.messages_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "relay.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            actor_id = %self.actor_id,
            dropped,
            "Mailbox full, message dropped"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }
}

/// Process-wide counters shared by the registry and the connection tasks.
///
/// `/api/v1/status` reads the failure counters from here, and the shutdown
/// log reads the gauges.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    active_rooms: AtomicUsize,
    active_connections: AtomicUsize,
    connection_panics: AtomicU64,
    deliveries_failed: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn room_created(&self) {
        self.active_rooms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn room_removed(&self) {
        self.active_rooms.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_created(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// A connection task panicked. Always a bug.
    pub fn record_panic(&self, actor_type: ActorType) {
        let total = self.connection_panics.fetch_add(1, Ordering::Relaxed) + 1;
        crate::observability::metrics::record_actor_panic(actor_type.as_str());
        error!(
            target: "relay.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = total,
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    /// An event could not be handed to one recipient.
    pub fn record_delivery_failed(&self) {
        self.deliveries_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.connection_panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn delivery_failures(&self) -> u64 {
        self.deliveries_failed.load(Ordering::Relaxed)
    }
}
