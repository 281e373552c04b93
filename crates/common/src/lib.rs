//! Common utilities and types shared across signal relay components.

#![warn(clippy::pedantic)]

/// Module for identifier types (rooms, connections, users)
pub mod types;

/// Module for common configuration
pub mod config;
