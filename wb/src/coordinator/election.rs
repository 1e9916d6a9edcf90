//! Leader election among windows
//!
//! Connect-then-bind: whoever answers on the canonical port is the Primary.
//! This only distinguishes "port free" from "port taken" on one trusted
//! machine; two windows starting at the same instant can both see a refusal
//! and both become Primary on different ports of the range.

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::transport::{ConnectOutcome, Transport, TransportError};

/// Role of this process, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Secondary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Outcome of the election
#[derive(Debug)]
pub enum Election {
    /// Holds the public listener
    Primary { listener: TcpListener, port: u16 },

    /// Connected to the Primary at `port`
    Secondary { link: TcpStream, port: u16 },
}

impl Election {
    pub fn role(&self) -> Role {
        match self {
            Self::Primary { .. } => Role::Primary,
            Self::Secondary { .. } => Role::Secondary,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Primary { port, .. } | Self::Secondary { port, .. } => *port,
        }
    }
}

/// Ports `[canonical, canonical + range)`, clipped at `u16::MAX`
pub fn candidate_ports(canonical: u16, range: u16) -> Vec<u16> {
    (0..range).filter_map(|offset| canonical.checked_add(offset)).collect()
}

/// Become Secondary if something answers on `canonical`, else bind the range
pub async fn elect(host: &str, canonical: u16, range: u16) -> Result<Election, TransportError> {
    debug!(%host, %canonical, %range, "elect: called");
    match Transport::connect_to(host, canonical).await {
        ConnectOutcome::Connected(link) => {
            info!(port = %canonical, "Primary found, running as Secondary");
            return Ok(Election::Secondary { link, port: canonical });
        }
        ConnectOutcome::Refused => debug!(port = %canonical, "elect: nothing listening"),
        ConnectOutcome::Failed(e) => {
            warn!(port = %canonical, error = %e, "Probe failed, assuming no Primary");
        }
    }

    let (listener, port) = Transport::listen(host, &candidate_ports(canonical, range)).await?;
    info!(%port, "Running as Primary");
    Ok(Election::Primary { listener, port })
}
