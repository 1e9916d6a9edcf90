//! Bridge - one window's running instance
//!
//! Wires election, transport, coordinator and front door together. A bridge
//! is a value: several of them can run side by side in one process.

use std::sync::Arc;

use eyre::{Context, Result, eyre};
use serde_json::json;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::coordinator::{Coordinator, CoordinatorHandle, Election, Role, elect};
use crate::front_door::{Dispatcher, FrontDoor};
use crate::protocol::{ControlCommand, Envelope, SnippetRelay};
use crate::providers::Collaborators;
use crate::transport::Transport;

/// A running window
pub struct Bridge {
    door: FrontDoor,
    port: u16,
    link_lost: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Run the election and start serving as Primary or Secondary
    pub async fn start(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let window_id = config
            .bridge
            .window_id
            .clone()
            .unwrap_or_else(|| format!("window-{}", Uuid::now_v7()));
        debug!(%window_id, "Bridge::start: called");

        let election = elect(&config.bridge.host, config.bridge.canonical_port, config.bridge.port_range)
            .await
            .context("Leader election failed")?;
        let role = election.role();
        let port = election.port();

        let (transport, events) = Transport::new(config.bridge.max_frame_bytes, config.coordinator.channel_buffer);
        let registry = Arc::new(CommandRegistry::standard());

        let coordinator = Coordinator::new(
            config.coordinator.clone(),
            transport.clone(),
            window_id.clone(),
            registry.strategies(),
        );
        let coordinator_handle = coordinator.handle();
        let mut tasks = vec![tokio::spawn(coordinator.run())];

        let primary_link = match election {
            Election::Primary { listener, .. } => {
                tasks.push(transport.serve(listener));
                None
            }
            Election::Secondary { link, .. } => Some(transport.attach(link).await),
        };

        let door = FrontDoor {
            transport: transport.clone(),
            coordinator: coordinator_handle,
            registry,
            collaborators,
            window_id: window_id.clone(),
            role,
            primary_link,
        };

        let link_lost = Arc::new(Notify::new());
        let dispatcher = Dispatcher::new(door.clone(), events, link_lost.clone());
        tasks.push(tokio::spawn(dispatcher.run()));

        if let Some(link) = primary_link {
            let register = Envelope::new_request(
                ControlCommand::RegisterSecondary.as_str(),
                json!({ "window_id": window_id }),
            );
            if !transport.send(link, &register) {
                for task in &tasks {
                    task.abort();
                }
                return Err(eyre!("Primary on port {port} closed before registration"));
            }
        }

        info!(%window_id, role = %role.as_str(), %port, "Bridge started");
        Ok(Self {
            door,
            port,
            link_lost,
            tasks,
        })
    }

    pub fn role(&self) -> Role {
        self.door.role
    }

    pub fn window_id(&self) -> &str {
        &self.door.window_id
    }

    /// Port the Primary listens on (for a Secondary: the Primary's port)
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this window's transport accepts connections
    pub fn is_listening(&self) -> bool {
        self.door.transport.listen_addr().is_some()
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.door.coordinator
    }

    /// Open connections (clients, Secondaries or the Primary link)
    pub fn peer_count(&self) -> usize {
        self.door.transport.peer_count()
    }

    /// Send the current editor selection toward `target_tab_id`
    ///
    /// Returns `false` when nothing is selected or the snippet was dropped.
    pub async fn send_snippet(&self, target_tab_id: Option<i64>) -> Result<bool> {
        let Some(snippet) = self.door.collaborators.snippets.current_selection() else {
            debug!("Bridge::send_snippet: nothing selected");
            return Ok(false);
        };

        self.door
            .relay_snippet(SnippetRelay {
                window_id: Some(self.door.window_id.clone()),
                target_tab_id,
                snippet,
            })
            .await
    }

    /// Resolves when a Secondary loses its Primary; never for a Primary
    pub async fn wait_link_lost(&self) {
        self.link_lost.notified().await
    }

    /// Stop serving; a Secondary unregisters from its Primary first
    pub async fn shutdown(self) {
        info!(window_id = %self.door.window_id, role = %self.door.role.as_str(), "Bridge shutting down");

        if let Some(link) = self.door.primary_link {
            let unregister = Envelope::new_request(
                ControlCommand::UnregisterSecondary.as_str(),
                json!({ "window_id": self.door.window_id }),
            );
            if !self.door.transport.send(link, &unregister) {
                debug!("Primary link already closed");
            }
            self.door.transport.close(link).await;
        }

        if let Err(e) = self.door.coordinator.shutdown().await {
            warn!(error = %e, "Coordinator already stopped");
        }
        for task in &self.tasks {
            task.abort();
        }
        self.door.transport.close_all().await;
        debug!("Bridge stopped");
    }
}
