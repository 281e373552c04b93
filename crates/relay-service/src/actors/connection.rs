//! Per-connection outbound queue.
//!
//! The registry never writes to a socket. Each live connection owns a bounded
//! queue of `Arc<ServerEvent>`; the registry holds the sending half inside a
//! [`ConnectionHandle`] and the WebSocket writer task drains the
//! [`OutboundQueue`].
//!
//! # Backpressure
//!
//! Delivery is a non-blocking `try_send`. A full queue means the peer has fallen
//! `outbound_queue_capacity` events behind; the registry evicts it by
//! cancelling its token, which ends the socket task and leads to a normal
//! disconnect.

use crate::signaling::protocol::ServerEvent;

use super::metrics::{ActorType, MailboxMonitor};

use common::types::ConnectionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio_util::sync::CancellationToken;

/// Result of handing one event to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the writer task.
    Queued,
    /// Queue is full. The recipient is too slow.
    QueueFull,
    /// Recipient is gone (writer finished or connection cancelled).
    Closed,
}

impl Delivery {
    /// Bounded label for the `reason` metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Delivery::Queued => "queued",
            Delivery::QueueFull => "queue_full",
            Delivery::Closed => "closed",
        }
    }
}

/// Registry-side handle to a live connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    sender: mpsc::Sender<Arc<ServerEvent>>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Enqueue an event without waiting.
    pub fn deliver(&self, event: Arc<ServerEvent>) -> Delivery {
        if self.cancel_token.is_cancelled() {
            return Delivery::Closed;
        }

        match self.sender.try_send(event) {
            Ok(()) => {
                self.mailbox.record_enqueue();
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.mailbox.record_drop();
                Delivery::QueueFull
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Ask the connection task to shut down.
    pub fn evict(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Events queued but not yet written.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.mailbox.current_depth()
    }
}

/// Writer-side end of a connection's queue.
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::Receiver<Arc<ServerEvent>>,
    mailbox: Arc<MailboxMonitor>,
}

impl OutboundQueue {
    /// Wait for the next event. `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<Arc<ServerEvent>> {
        let event = self.receiver.recv().await?;
        self.mailbox.record_dequeue();
        Some(event)
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Result<Arc<ServerEvent>, TryRecvError> {
        let event = self.receiver.try_recv()?;
        self.mailbox.record_dequeue();
        Ok(event)
    }
}

/// Create the queue for a new connection.
///
/// `cancel_token` is the token the connection task selects on; eviction and
/// shutdown both go through it.
#[must_use]
pub fn outbound_channel(
    connection_id: ConnectionId,
    capacity: usize,
    cancel_token: CancellationToken,
) -> (ConnectionHandle, OutboundQueue) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let mailbox = Arc::new(MailboxMonitor::new(
        ActorType::Connection,
        connection_id.as_str(),
    ));

    let handle = ConnectionHandle {
        connection_id,
        sender,
        cancel_token,
        mailbox: Arc::clone(&mailbox),
    };
    let queue = OutboundQueue { receiver, mailbox };
    (handle, queue)
}
