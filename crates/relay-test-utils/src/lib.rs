//! # Relay Test Utilities
//!
//! Shared test utilities for the Signal Relay service.
//!
//! ## Modules
//!
//! - `fixtures` - Room names, signaling payloads, configs
//! - `test_client` - [`TestClient`]: a connection registered directly with a
//!   registry actor, with its outbound queue exposed for assertions
//! - `server` - [`TestServer`]: the full router on an ephemeral port, and
//!   [`WsTestClient`], a real WebSocket client for it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let registry = test_registry();
//!     let mut alice = TestClient::connect(&registry, "c1").await;
//!
//!     alice.join("lobby", "alice").await;
//!     let event = alice.next_event().await;
//!     // assert on event...
//! }
//! ```
//!
//! ```rust,ignore
//! let server = TestServer::spawn(test_config()).await;
//! let mut ws = WsTestClient::connect(&server.ws_url()).await;
//! ws.join("lobby", "alice").await;
//! ```

pub mod fixtures;
pub mod server;
pub mod test_client;

// Re-export commonly used items
pub use fixtures::*;
pub use server::{TestServer, WsTestClient};
pub use test_client::TestClient;
