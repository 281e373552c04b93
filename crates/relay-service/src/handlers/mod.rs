//! HTTP request handlers for the signal relay.

pub mod metrics;
pub mod status;
pub mod websocket;

pub use metrics::metrics_handler;
pub use status::{get_room, get_status};
pub use websocket::ws_handler;
