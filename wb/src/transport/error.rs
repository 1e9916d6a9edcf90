//! Transport error types

use thiserror::Error;

/// Errors surfaced by the transport to its caller
///
/// Per-peer socket failures are never returned; they close that peer and
/// show up as [`super::TransportEvent::Closed`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind port {port}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("All candidate ports are in use: {ports:?}")]
    PortsExhausted { ports: Vec<u16> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_exhausted_lists_ports() {
        let err = TransportError::PortsExhausted {
            ports: vec![55155, 55156],
        };
        let msg = err.to_string();
        assert!(msg.contains("55155"));
        assert!(msg.contains("55156"));
    }
}
