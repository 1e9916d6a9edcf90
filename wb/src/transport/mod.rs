//! Loopback TCP transport
//!
//! One listening socket (Primary only), an accept loop, length-prefixed JSON
//! frames and a connection table holding mutable per-peer metadata. Every
//! connection, accepted or outbound, gets a [`PeerId`] and one reader and one
//! writer task. Everything the reader sees is reported through
//! [`TransportEvent`]s on a single channel.

mod connection;
mod core;
mod error;
mod peer;

pub use core::{ConnectOutcome, Transport};
pub use error::TransportError;
pub use peer::{PeerId, PeerMeta, TransportEvent};
