//! Actor model implementation for the signal relay.
//!
//! ```text
//! RoomRegistryActor (singleton per process)
//! ├── owns every Room (member list + announced user ids)
//! ├── owns the reverse index connection -> rooms
//! └── holds a ConnectionHandle per live connection
//!     └── bounded outbound queue, drained by that connection's WebSocket writer
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single exclusion point**: all membership changes are messages to one actor
//! - **No I/O in the actor**: fan-out is `try_send` onto per-connection queues
//! - **Slow peers are evicted**: a full outbound queue cancels that connection
//! - **CancellationToken per connection**: eviction and shutdown share one path
//!
//! # Modules
//!
//! - [`registry`] - `RoomRegistryActor` and its handle
//! - [`room`] - Room membership model
//! - [`connection`] - Per-connection outbound queue and handle
//! - [`messages`] - Message and outcome types
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod connection;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

// Re-export primary types
pub use connection::{outbound_channel, ConnectionHandle, Delivery, OutboundQueue};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use registry::{RegistrySettings, RoomRegistryActor, RoomRegistryActorHandle};
pub use room::Room;
