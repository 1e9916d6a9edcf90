//! WorkBridge - workspace context for browser clients
//!
//! Several editor windows on one machine present themselves to an external
//! client as a single backend. The first window to start becomes the Primary
//! and owns the public socket; later windows connect to it as Secondaries.
//! Requests are broadcast to every window and the answers are merged.
//!
//! # Modules
//!
//! - [`protocol`] - Envelope, framing, error codes and relay payloads
//! - [`transport`] - Connection table and per-peer reader/writer tasks
//! - [`coordinator`] - Election, Secondary registry and aggregation
//! - [`aggregation`] - Per-command merge strategies
//! - [`commands`] - Workspace command handlers
//! - [`providers`] - Workspace, file, search and editor collaborators
//! - [`front_door`] - Validation and dispatch of incoming frames
//! - [`bridge`] - One running window
//! - [`client`] - Async client for the Primary's socket
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod aggregation;
pub mod bridge;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod front_door;
pub mod protocol;
pub mod providers;
pub mod transport;

// Re-export commonly used types
pub use bridge::Bridge;
pub use client::BridgeClient;
pub use config::Config;
pub use coordinator::{CoordinatorHandle, CoordinatorMetrics, Role};
pub use protocol::{Envelope, ErrorCode, MessageType};
pub use providers::Collaborators;
