//! Main Coordinator task implementation

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, CoordinatorMetrics, RegistrationError, Route, WindowInfo};
use crate::aggregation::{AggregationStrategy, StrategyTable};
use crate::protocol::{Envelope, SNIPPET_PUSH, SnippetRelay};
use crate::transport::{PeerId, Transport};

/// One broadcast waiting for its windows
struct PendingAggregation {
    requester: PeerId,
    original_message_id: String,
    command: String,
    strategy: AggregationStrategy,
    expected: usize,
    /// `(window_id, payload)` in arrival order
    collected: Vec<(String, Value)>,
    opened: Instant,
}

impl PendingAggregation {
    fn has_window(&self, window_id: &str) -> bool {
        self.collected.iter().any(|(w, _)| w == window_id)
    }

    fn is_complete(&self) -> bool {
        self.collected.len() >= self.expected
    }
}

/// State owned by the running coordinator task
struct State {
    /// window_id -> peer of every registered Secondary
    secondaries: BTreeMap<String, PeerId>,
    pending: HashMap<String, PendingAggregation>,
    metrics: CoordinatorMetrics,
}

/// The Coordinator owns the Secondary registry and the aggregation table
pub struct Coordinator {
    config: CoordinatorConfig,
    transport: Transport,
    window_id: String,
    strategies: StrategyTable,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
}

impl Coordinator {
    /// Create a new Coordinator for `window_id`
    pub fn new(
        config: CoordinatorConfig,
        transport: Transport,
        window_id: impl Into<String>,
        strategies: StrategyTable,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self {
            config,
            transport,
            window_id: window_id.into(),
            strategies,
            tx,
            rx,
        }
    }

    /// Get a handle for talking to the coordinator
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested.
    pub async fn run(mut self) {
        let mut state = State {
            secondaries: BTreeMap::new(),
            pending: HashMap::new(),
            metrics: CoordinatorMetrics::default(),
        };

        info!(window_id = %self.window_id, "Coordinator started");

        while let Some(req) = self.rx.recv().await {
            match req {
                CoordRequest::RegisterSecondary {
                    peer,
                    window_id,
                    reply_tx,
                } => {
                    let result = self
                        .register_secondary(&mut state, peer, window_id)
                        .map(|()| state.secondaries.len());
                    let _ = reply_tx.send(result);
                }

                CoordRequest::UnregisterSecondary {
                    peer,
                    window_id,
                    reply_tx,
                } => {
                    let removed = match state.secondaries.get(&window_id) {
                        Some(owner) if *owner == peer => state.secondaries.remove(&window_id).is_some(),
                        _ => false,
                    };
                    if removed {
                        info!(%peer, %window_id, "Secondary unregistered");
                        self.transport.update_meta(peer, |meta| meta.is_secondary = false);
                    } else {
                        debug!(%peer, %window_id, "Unregister for unknown secondary ignored");
                    }
                    state.metrics.registered_secondaries = state.secondaries.len();
                    let _ = reply_tx.send(removed);
                }

                CoordRequest::PeerClosed { peer } => {
                    let before = state.secondaries.len();
                    state.secondaries.retain(|_, owner| *owner != peer);
                    if state.secondaries.len() != before {
                        info!(%peer, remaining = %state.secondaries.len(), "Secondary disconnected");
                    }
                    state.metrics.registered_secondaries = state.secondaries.len();
                }

                CoordRequest::Route {
                    requester,
                    message_id,
                    command,
                    payload,
                    reply_tx,
                } => {
                    let route = self.route(&mut state, requester, message_id, command, payload);
                    let _ = reply_tx.send(route);
                }

                CoordRequest::Contribute {
                    aggregation_id,
                    window_id,
                    payload,
                } => {
                    self.contribute(&mut state, aggregation_id, window_id, payload);
                }

                CoordRequest::AggregationTimeout { aggregation_id } => {
                    match state.pending.remove(&aggregation_id) {
                        Some(pending) => {
                            warn!(
                                %aggregation_id,
                                command = %pending.command,
                                collected = %pending.collected.len(),
                                expected = %pending.expected,
                                "Aggregation timed out, answering with partial results"
                            );
                            state.metrics.partial_timeouts += 1;
                            self.complete(&mut state, aggregation_id, pending);
                        }
                        None => debug!(%aggregation_id, "Timeout for completed aggregation ignored"),
                    }
                }

                CoordRequest::DeliverSnippet { relay, reply_tx } => {
                    let delivered = self.deliver_snippet(relay);
                    if delivered {
                        state.metrics.snippets_delivered += 1;
                    } else {
                        state.metrics.snippets_dropped += 1;
                    }
                    let _ = reply_tx.send(delivered);
                }

                CoordRequest::ListWindows { reply_tx } => {
                    let mut windows = vec![WindowInfo {
                        window_id: self.window_id.clone(),
                        role: "primary".to_string(),
                        peer: None,
                    }];
                    windows.extend(state.secondaries.iter().map(|(window_id, peer)| WindowInfo {
                        window_id: window_id.clone(),
                        role: "secondary".to_string(),
                        peer: Some(peer.to_string()),
                    }));
                    let _ = reply_tx.send(windows);
                }

                CoordRequest::GetMetrics { reply_tx } => {
                    state.metrics.pending_aggregations = state.pending.len();
                    let _ = reply_tx.send(state.metrics.clone());
                }

                CoordRequest::Shutdown => {
                    info!(pending = %state.pending.len(), "Coordinator shutting down");
                    break;
                }
            }
        }

        info!("Coordinator stopped");
    }

    fn register_secondary(&self, state: &mut State, peer: PeerId, window_id: String) -> Result<(), RegistrationError> {
        if window_id == self.window_id {
            warn!(%peer, %window_id, "Secondary claims the Primary's window id, refused");
            return Err(RegistrationError::PrimaryWindowId(window_id));
        }

        let bound = self.transport.update_meta(peer, |meta| {
            meta.is_secondary = true;
            meta.window_id = Some(window_id.clone());
        });
        if !bound {
            debug!(%peer, %window_id, "Secondary closed before registration");
            return Ok(());
        }

        // A peer is one window; a new id replaces its old one
        state.secondaries.retain(|existing, owner| {
            let stale = *owner == peer && *existing != window_id;
            if stale {
                info!(%peer, previous = %existing, %window_id, "Secondary re-registered under a new id");
            }
            !stale
        });

        if let Some(previous) = state.secondaries.insert(window_id.clone(), peer)
            && previous != peer
        {
            warn!(%window_id, %previous, %peer, "Window id re-registered by another peer");
        }
        state.metrics.registered_secondaries = state.secondaries.len();
        info!(%peer, %window_id, total = %state.secondaries.len(), "Secondary registered");
        Ok(())
    }

    fn route(&self, state: &mut State, requester: PeerId, message_id: String, command: String, payload: Value) -> Route {
        let meta = self.transport.meta(requester).unwrap_or_default();
        debug!(%requester, %command, ?meta, "Coordinator::route: called");

        if meta.is_secondary {
            return Route::Local;
        }

        let targets: Vec<(String, PeerId)> = match meta.window_id.as_deref() {
            Some(bound) if bound == self.window_id => return Route::Local,
            Some(bound) => match state.secondaries.get(bound) {
                Some(peer) => vec![(bound.to_string(), *peer)],
                None => {
                    debug!(%requester, %bound, "Bound window unknown, answering locally");
                    return Route::Local;
                }
            },
            None if state.secondaries.is_empty() => return Route::Local,
            None => state.secondaries.iter().map(|(w, p)| (w.clone(), *p)).collect(),
        };

        let include_local = meta.window_id.is_none();
        let aggregation_id = Uuid::now_v7().to_string();
        let expected = targets.len() + usize::from(include_local);
        let strategy = self.strategies.get(&command);

        state.pending.insert(
            aggregation_id.clone(),
            PendingAggregation {
                requester,
                original_message_id: message_id,
                command: command.clone(),
                strategy,
                expected,
                collected: Vec::with_capacity(expected),
                opened: Instant::now(),
            },
        );

        let forward = Envelope::request(aggregation_id.clone(), command.clone(), payload);
        for (window_id, peer) in &targets {
            if !self.transport.send(*peer, &forward) {
                warn!(%aggregation_id, %window_id, %peer, "Forward to secondary failed; timeout will bound the wait");
            }
        }

        let timeout_tx = self.tx.clone();
        let timeout = self.config.aggregation_timeout();
        let timeout_id = aggregation_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = timeout_tx
                .send(CoordRequest::AggregationTimeout {
                    aggregation_id: timeout_id,
                })
                .await;
        });

        info!(%aggregation_id, %command, %expected, %include_local, "Aggregation opened");
        Route::Aggregate {
            aggregation_id,
            include_local,
        }
    }

    fn contribute(&self, state: &mut State, aggregation_id: String, window_id: String, payload: Value) {
        let Some(pending) = state.pending.get_mut(&aggregation_id) else {
            warn!(%aggregation_id, %window_id, "Late contribution discarded");
            state.metrics.late_contributions += 1;
            return;
        };

        if pending.has_window(&window_id) {
            debug!(%aggregation_id, %window_id, "Duplicate contribution ignored");
            return;
        }

        debug!(%aggregation_id, %window_id, "Contribution collected");
        pending.collected.push((window_id, payload));

        if pending.is_complete()
            && let Some(pending) = state.pending.remove(&aggregation_id)
        {
            self.complete(state, aggregation_id, pending);
        }
    }

    fn complete(&self, state: &mut State, aggregation_id: String, pending: PendingAggregation) {
        let merged = pending.strategy.aggregate(&self.window_id, &pending.collected);
        let reply = Envelope::reply(pending.original_message_id, pending.command, merged);

        if !self.transport.send(pending.requester, &reply) {
            debug!(%aggregation_id, requester = %pending.requester, "Requester gone, result dropped");
        }

        state.metrics.completed += 1;
        debug!(
            %aggregation_id,
            windows = %pending.collected.len(),
            elapsed_ms = %pending.opened.elapsed().as_millis(),
            "Aggregation completed"
        );
    }

    fn deliver_snippet(&self, relay: SnippetRelay) -> bool {
        let Some(peer) = self
            .transport
            .find_tab_peer(relay.target_tab_id, relay.window_id.as_deref())
        else {
            warn!(target_tab_id = ?relay.target_tab_id, window_id = ?relay.window_id, "No tab for snippet, dropped");
            return false;
        };

        let payload = match serde_json::to_value(&relay.snippet) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode snippet, dropped");
                return false;
            }
        };

        let delivered = self.transport.send(peer, &Envelope::push(SNIPPET_PUSH, payload));
        if delivered {
            info!(%peer, "Snippet delivered");
        }
        delivered
    }
}
