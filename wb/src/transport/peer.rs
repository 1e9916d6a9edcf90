//! Peer identity, metadata and transport events

use std::fmt;

/// Process-local handle for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub(crate) u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Mutable metadata kept per peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerMeta {
    /// Set once the peer registered itself as a Secondary window
    pub is_secondary: bool,

    /// Window the peer speaks for (Secondary) or is bound to (client)
    pub window_id: Option<String>,

    /// Browser tab that receives snippet pushes through this peer
    pub active_tab_id: Option<i64>,

    pub active_host: Option<String>,
}

impl PeerMeta {
    /// True for an external client that registered a browser tab
    pub fn is_tab_client(&self) -> bool {
        !self.is_secondary && self.active_tab_id.is_some()
    }
}

/// Events reported by the transport
#[derive(Debug)]
pub enum TransportEvent {
    /// A peer was attached (emitted once per peer)
    Connected { peer: PeerId },

    /// One complete frame arrived
    Message { peer: PeerId, frame: Vec<u8> },

    /// The peer was removed after EOF or a socket error
    Closed {
        peer: PeerId,
        meta: PeerMeta,
        error: Option<String>,
    },
}
