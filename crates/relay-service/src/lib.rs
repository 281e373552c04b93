//! Signal Relay Service Library
//!
//! A WebSocket signaling relay that lets browser peers discover each other
//! and exchange WebRTC handshake data (session descriptions and ICE
//! candidates). The relay never touches media; it brokers small JSON
//! control messages between clients grouped into named rooms.
//!
//! # Architecture
//!
//! ```text
//! axum router
//! ├── GET /ws ── one task per connection
//! │   ├── reader: decode frame -> RoomRegistryActorHandle
//! │   └── writer: outbound queue -> socket (+ keepalive pings)
//! └── health / ready / metrics / status / rooms
//!
//! RoomRegistryActor (singleton)
//! └── rooms + reverse index, fan-out via try_send onto outbound queues
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Registry actor, room model, outbound queues
//! - [`signaling`] - Wire protocol and WebSocket transport
//! - [`routes`] / [`handlers`] - HTTP surface
//! - [`observability`] - Health probes and Prometheus metrics
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-facing codes

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod signaling;
