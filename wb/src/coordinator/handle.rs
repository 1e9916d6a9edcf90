//! CoordinatorHandle - client interface for the front door and the bridge

use eyre::{Result, eyre};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{CoordRequest, CoordinatorMetrics, Route, WindowInfo};
use crate::protocol::SnippetRelay;
use crate::transport::PeerId;

/// Handle for interacting with the Coordinator
///
/// This handle is cloneable; every operation is a message to the
/// coordinator task, so calls from different tasks are serialized there.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        Self { tx }
    }

    async fn send(&self, req: CoordRequest) -> Result<()> {
        self.tx
            .send(req)
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))
    }

    async fn ask<T>(&self, req: CoordRequest, reply_rx: oneshot::Receiver<T>) -> Result<T> {
        self.send(req).await?;
        reply_rx
            .await
            .map_err(|_| eyre!("Coordinator dropped the reply"))
    }

    /// Register `peer` as the Secondary for `window_id`; returns the registry size
    ///
    /// A refusal is a [`super::RegistrationError`] inside the report.
    pub async fn register_secondary(&self, peer: PeerId, window_id: &str) -> Result<usize> {
        debug!(%peer, %window_id, "CoordinatorHandle::register_secondary: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(
            CoordRequest::RegisterSecondary {
                peer,
                window_id: window_id.to_string(),
                reply_tx,
            },
            reply_rx,
        )
        .await?
        .map_err(Into::into)
    }

    /// Remove `window_id` if `peer` owns it; returns whether it was removed
    pub async fn unregister_secondary(&self, peer: PeerId, window_id: &str) -> Result<bool> {
        debug!(%peer, %window_id, "CoordinatorHandle::unregister_secondary: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(
            CoordRequest::UnregisterSecondary {
                peer,
                window_id: window_id.to_string(),
                reply_tx,
            },
            reply_rx,
        )
        .await
    }

    /// Forget everything keyed by a closed peer
    pub async fn peer_closed(&self, peer: PeerId) -> Result<()> {
        debug!(%peer, "CoordinatorHandle::peer_closed: called");
        self.send(CoordRequest::PeerClosed { peer }).await
    }

    /// Decide how a workspace request from `requester` is answered
    ///
    /// On [`Route::Aggregate`] the request has already been forwarded and the
    /// reply will be sent by the coordinator.
    pub async fn route(&self, requester: PeerId, message_id: &str, command: &str, payload: Value) -> Result<Route> {
        debug!(%requester, %message_id, %command, "CoordinatorHandle::route: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(
            CoordRequest::Route {
                requester,
                message_id: message_id.to_string(),
                command: command.to_string(),
                payload,
                reply_tx,
            },
            reply_rx,
        )
        .await
    }

    /// Feed one window's payload into an open aggregation
    pub async fn contribute(&self, aggregation_id: &str, window_id: &str, payload: Value) -> Result<()> {
        debug!(%aggregation_id, %window_id, "CoordinatorHandle::contribute: called");
        self.send(CoordRequest::Contribute {
            aggregation_id: aggregation_id.to_string(),
            window_id: window_id.to_string(),
            payload,
        })
        .await
    }

    /// Push a snippet to its tab; returns whether a tab received it
    pub async fn deliver_snippet(&self, relay: SnippetRelay) -> Result<bool> {
        debug!(target_tab_id = ?relay.target_tab_id, "CoordinatorHandle::deliver_snippet: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(CoordRequest::DeliverSnippet { relay, reply_tx }, reply_rx)
            .await
    }

    /// This window and every registered Secondary
    pub async fn windows(&self) -> Result<Vec<WindowInfo>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(CoordRequest::ListWindows { reply_tx }, reply_rx).await
    }

    pub async fn metrics(&self) -> Result<CoordinatorMetrics> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ask(CoordRequest::GetMetrics { reply_tx }, reply_rx).await
    }

    /// Request shutdown of the Coordinator
    pub async fn shutdown(&self) -> Result<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.send(CoordRequest::Shutdown).await
    }
}
