//! Client-facing signaling: the JSON wire protocol and the WebSocket transport.

pub mod protocol;
pub mod websocket;

pub use protocol::{ClientMessage, ServerEvent, SignalKind};
pub use websocket::{serve_socket, CloseReason, TransportSettings};
