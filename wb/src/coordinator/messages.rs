//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::protocol::SnippetRelay;
use crate::transport::PeerId;

/// Where a workspace request gets answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Run locally and reply directly
    Local,

    /// An aggregation was opened; the reply comes from the coordinator
    Aggregate {
        aggregation_id: String,
        /// Whether the local result must be contributed too
        include_local: bool,
    },
}

/// One window known to the Primary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub window_id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

/// Why a `register_secondary` was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Window id {0} belongs to the Primary")]
    PrimaryWindowId(String),
}

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// A peer announced itself as a Secondary window
    RegisterSecondary {
        peer: PeerId,
        window_id: String,
        reply_tx: oneshot::Sender<Result<usize, RegistrationError>>,
    },

    /// A Secondary is going away
    UnregisterSecondary {
        peer: PeerId,
        window_id: String,
        reply_tx: oneshot::Sender<bool>,
    },

    /// The transport removed a peer
    PeerClosed { peer: PeerId },

    /// Decide how to answer a workspace request
    Route {
        requester: PeerId,
        message_id: String,
        command: String,
        payload: Value,
        reply_tx: oneshot::Sender<Route>,
    },

    /// One window's payload for an open aggregation
    Contribute {
        aggregation_id: String,
        window_id: String,
        payload: Value,
    },

    /// Aggregation deadline reached (internal)
    AggregationTimeout { aggregation_id: String },

    /// Push a snippet to the matching browser tab
    DeliverSnippet {
        relay: SnippetRelay,
        reply_tx: oneshot::Sender<bool>,
    },

    /// This window plus every registered Secondary
    ListWindows {
        reply_tx: oneshot::Sender<Vec<WindowInfo>>,
    },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorMetrics {
    pub registered_secondaries: usize,
    pub pending_aggregations: usize,
    pub completed: u64,
    pub partial_timeouts: u64,
    pub late_contributions: u64,
    pub snippets_delivered: u64,
    pub snippets_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_info_skips_missing_peer() {
        let info = WindowInfo {
            window_id: "w-1".to_string(),
            role: "primary".to_string(),
            peer: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("peer").is_none());
        assert_eq!(json["role"], "primary");
    }
}
