//! Front door: turns transport events into work and replies
//!
//! The [`Dispatcher`] is the one task consuming [`TransportEvent`]s. Control
//! commands are applied inline, in arrival order. Workspace commands pass
//! the precondition inline and are then executed on their own task, so
//! independent requests from one connection may finish out of order.

mod control;
mod validate;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::commands::{CommandContext, CommandRegistry};
use crate::coordinator::{CoordinatorHandle, Role, Route};
use crate::protocol::{
    ControlCommand, Envelope, ErrorCode, ForwardedResponse, MessageType, SnippetRelay,
    error_payload,
};
use crate::providers::Collaborators;
use crate::transport::{PeerId, Transport, TransportEvent};

pub use validate::parse_envelope;

/// Everything a request needs, cheap to clone into spawned tasks
#[derive(Clone)]
pub struct FrontDoor {
    pub(crate) transport: Transport,
    pub(crate) coordinator: CoordinatorHandle,
    pub(crate) registry: Arc<CommandRegistry>,
    pub(crate) collaborators: Collaborators,
    pub(crate) window_id: String,
    pub(crate) role: Role,
    /// The connection to the Primary (Secondary only)
    pub(crate) primary_link: Option<PeerId>,
}

impl FrontDoor {
    fn context(&self, peer: PeerId) -> CommandContext {
        CommandContext::new(self.window_id.clone(), self.transport.meta(peer), self.collaborators.clone())
    }

    fn reply_error(&self, peer: PeerId, env: &Envelope, code: ErrorCode, msg: impl Into<String>) {
        self.transport
            .send(peer, &Envelope::error(env.message_id.clone(), env.command.clone(), code, msg));
    }

    /// Handle one raw frame from `peer`
    pub async fn handle_frame(&self, peer: PeerId, frame: &[u8]) {
        let env = match parse_envelope(frame) {
            Ok(env) => env,
            Err(reply) => {
                debug!(%peer, code = ?reply.error_code(), "FrontDoor::handle_frame: rejected");
                self.transport.send(peer, &reply);
                return;
            }
        };
        debug!(%peer, kind = ?env.kind, command = %env.command, message_id = %env.message_id, "FrontDoor::handle_frame: parsed");

        match env.kind {
            MessageType::Request => self.handle_request(peer, env).await,
            MessageType::Push => self.handle_push(peer, env).await,
            MessageType::Response | MessageType::ErrorResponse => {
                debug!(%peer, command = %env.command, success = ?env.payload.get("success"), "Acknowledgement received");
            }
        }
    }

    async fn handle_request(&self, peer: PeerId, env: Envelope) {
        if let Some(control) = ControlCommand::parse(&env.command) {
            let reply = control::handle(self, peer, control, &env).await;
            self.transport
                .send(peer, &Envelope::reply(env.message_id, env.command, reply));
            return;
        }

        // Everything from the Primary comes back as this window's contribution
        if self.role == Role::Secondary && Some(peer) == self.primary_link {
            self.spawn_forwarded(peer, env);
            return;
        }

        if !self.registry.has_command(&env.command) {
            let msg = format!("Unknown command: {}", env.command);
            self.reply_error(peer, &env, ErrorCode::UnknownCommand, msg);
            return;
        }

        let ctx = self.context(peer);
        if let Err(e) = self.registry.precondition(&env.command, &ctx) {
            self.reply_error(peer, &env, e.code(), e.to_string());
            return;
        }

        let door = self.clone();
        tokio::spawn(async move { door.answer(peer, env, ctx).await });
    }

    /// Route and answer a workspace request
    async fn answer(&self, peer: PeerId, env: Envelope, ctx: CommandContext) {
        let route = match self
            .coordinator
            .route(peer, &env.message_id, &env.command, env.payload.clone())
            .await
        {
            Ok(route) => route,
            Err(e) => {
                warn!(%peer, error = %e, "Routing failed, answering locally");
                Route::Local
            }
        };

        match route {
            Route::Local => {
                let payload = self.registry.invoke(&env.command, env.payload, &ctx).await;
                self.transport
                    .send(peer, &Envelope::reply(env.message_id, env.command, payload));
            }
            Route::Aggregate {
                aggregation_id,
                include_local,
            } => {
                if !include_local {
                    return;
                }
                let payload = self.registry.invoke(&env.command, env.payload, &ctx).await;
                if let Err(e) = self.coordinator.contribute(&aggregation_id, &self.window_id, payload).await {
                    warn!(%aggregation_id, error = %e, "Failed to contribute local result");
                }
            }
        }
    }

    /// Execute a request forwarded by the Primary and push the result back
    fn spawn_forwarded(&self, link: PeerId, env: Envelope) {
        let door = self.clone();
        tokio::spawn(async move {
            let ctx = door.context(link);
            let response = door.registry.execute(&env.command, env.payload, &ctx).await;
            let forwarded = ForwardedResponse {
                original_message_id: env.message_id,
                window_id: door.window_id.clone(),
                response,
            };

            match serde_json::to_value(&forwarded) {
                Ok(payload) => {
                    debug!(message_id = %forwarded.original_message_id, "Returning forwarded result");
                    door.transport
                        .send(link, &Envelope::push(ControlCommand::ForwardResponse.as_str(), payload));
                }
                Err(e) => warn!(error = %e, "Failed to encode forwarded result"),
            }
        });
    }

    /// Deliver a snippet from this window
    ///
    /// The Primary pushes it to the matching tab; a Secondary relays it to the
    /// Primary as `forward_push`. Returns whether it left this window.
    pub async fn relay_snippet(&self, relay: SnippetRelay) -> eyre::Result<bool> {
        debug!(target_tab_id = ?relay.target_tab_id, role = %self.role.as_str(), "FrontDoor::relay_snippet: called");
        match (self.role, self.primary_link) {
            (Role::Secondary, Some(link)) => {
                let payload = serde_json::to_value(&relay)?;
                let sent = self
                    .transport
                    .send(link, &Envelope::push(ControlCommand::ForwardPush.as_str(), payload));
                if !sent {
                    warn!(target_tab_id = ?relay.target_tab_id, "Snippet dropped, Primary link is closed");
                }
                Ok(sent)
            }
            _ => self.coordinator.deliver_snippet(relay).await,
        }
    }

    async fn handle_push(&self, peer: PeerId, env: Envelope) {
        match ControlCommand::parse(&env.command) {
            Some(control @ (ControlCommand::ForwardResponse | ControlCommand::ForwardPush)) => {
                let outcome = control::handle(self, peer, control, &env).await;
                if outcome.get("success").and_then(Value::as_bool) != Some(true) {
                    debug!(%peer, command = %env.command, ?outcome, "Push not applied");
                }
            }
            _ => debug!(%peer, command = %env.command, "Ignoring push"),
        }
    }
}

/// The transport event loop of one bridge
pub struct Dispatcher {
    door: FrontDoor,
    events: mpsc::Receiver<TransportEvent>,
    link_lost: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(door: FrontDoor, events: mpsc::Receiver<TransportEvent>, link_lost: Arc<Notify>) -> Self {
        Self {
            door,
            events,
            link_lost,
        }
    }

    /// Run until the transport's event channel closes
    pub async fn run(mut self) {
        info!(window_id = %self.door.window_id, role = %self.door.role.as_str(), "Dispatcher started");

        while let Some(event) = self.events.recv().await {
            match event {
                TransportEvent::Connected { peer } => debug!(%peer, "Peer connected"),

                TransportEvent::Message { peer, frame } => self.door.handle_frame(peer, &frame).await,

                TransportEvent::Closed { peer, meta, error } => {
                    info!(%peer, is_secondary = %meta.is_secondary, window_id = ?meta.window_id, ?error, "Peer closed");
                    if Some(peer) == self.door.primary_link {
                        warn!(%peer, "Lost connection to Primary");
                        self.link_lost.notify_one();
                    }
                    if let Err(e) = self.door.coordinator.peer_closed(peer).await {
                        debug!(error = %e, "Coordinator gone while closing peer");
                    }
                }
            }
        }

        debug!("Dispatcher stopped");
    }
}

/// `{success: false}` payload for a control command rejected on this role
pub(crate) fn wrong_role(command: &str, role: Role) -> Value {
    error_payload(
        ErrorCode::CommandExecutionError,
        format!("{command} is not accepted by a {} window", role.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::testing::context_for;
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use crate::protocol::DEFAULT_MAX_FRAME_BYTES;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn door(role: Role) -> FrontDoor {
        let (transport, _events) = Transport::new(DEFAULT_MAX_FRAME_BYTES, 64);
        let registry = Arc::new(CommandRegistry::standard());
        let coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            transport.clone(),
            "w-test",
            registry.strategies(),
        );
        let handle = coordinator.handle();
        tokio::spawn(coordinator.run());

        FrontDoor {
            transport,
            coordinator: handle,
            registry,
            collaborators: context_for(vec![], true).collaborators,
            window_id: "w-test".to_string(),
            role,
            primary_link: None,
        }
    }

    async fn recv(rx: &mut UnboundedReceiver<Vec<u8>>) -> Envelope {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("mailbox closed");
        Envelope::from_slice(&frame).unwrap()
    }

    fn frame(env: &Envelope) -> Vec<u8> {
        env.to_bytes().unwrap()
    }

    #[tokio::test]
    async fn test_register_target_binds_peer() {
        let door = door(Role::Primary);
        let (peer, mut rx) = door.transport.attach_mailbox();

        let env = Envelope::request("m-1", "register_target", json!({"tab_id": 12, "host": "example.com"}));
        door.handle_frame(peer, &frame(&env)).await;

        let reply = recv(&mut rx).await;
        assert_eq!(reply.message_id, "m-1");
        assert_eq!(reply.kind, MessageType::Response);

        let meta = door.transport.meta(peer).unwrap();
        assert_eq!(meta.active_tab_id, Some(12));
        assert_eq!(meta.active_host.as_deref(), Some("example.com"));
        assert!(meta.window_id.is_none());
    }

    #[tokio::test]
    async fn test_precondition_answered_inline() {
        let door = door(Role::Primary);
        let (peer, mut rx) = door.transport.attach_mailbox();

        let env = Envelope::request("m-2", "get_open_files", json!({}));
        door.handle_frame(peer, &frame(&env)).await;

        let reply = recv(&mut rx).await;
        assert_eq!(reply.kind, MessageType::ErrorResponse);
        assert_eq!(reply.error_code(), Some("NO_WORKSPACE_OPEN"));
    }

    #[tokio::test]
    async fn test_secondary_rejects_registration() {
        let door = door(Role::Secondary);
        let (peer, mut rx) = door.transport.attach_mailbox();

        let env = Envelope::request("m-3", "register_secondary", json!({"window_id": "w-x"}));
        door.handle_frame(peer, &frame(&env)).await;

        let reply = recv(&mut rx).await;
        assert_eq!(reply.kind, MessageType::ErrorResponse);
        assert_eq!(reply.error_code(), Some("COMMAND_EXECUTION_ERROR"));
    }

    #[tokio::test]
    async fn test_unknown_forwarded_command_is_contributed() {
        let mut door = door(Role::Secondary);
        let (link, mut rx) = door.transport.attach_mailbox();
        door.primary_link = Some(link);

        let env = Envelope::request("agg-1", "get_something_new", json!({}));
        door.handle_frame(link, &frame(&env)).await;

        let pushed = recv(&mut rx).await;
        assert_eq!(pushed.kind, MessageType::Push);
        assert_eq!(pushed.command, "forward_response");
        assert_eq!(pushed.payload["original_message_id"], "agg-1");
        assert_eq!(pushed.payload["window_id"], "w-test");
        assert_eq!(pushed.payload["response"]["success"], false);
        assert_eq!(pushed.payload["response"]["errorCode"], "UNKNOWN_COMMAND");
    }

    #[tokio::test]
    async fn test_register_secondary_refuses_own_window_id() {
        let door = door(Role::Primary);
        let (peer, mut rx) = door.transport.attach_mailbox();

        let env = Envelope::request("m-4", "register_secondary", json!({"window_id": "w-test"}));
        door.handle_frame(peer, &frame(&env)).await;

        let reply = recv(&mut rx).await;
        assert_eq!(reply.kind, MessageType::ErrorResponse);
        assert_eq!(reply.error_code(), Some("INVALID_PAYLOAD"));
        assert!(!door.transport.meta(peer).unwrap().is_secondary);
    }

    #[tokio::test]
    async fn test_pushes_get_no_reply() {
        let door = door(Role::Primary);
        let (peer, mut rx) = door.transport.attach_mailbox();

        door.handle_frame(peer, &frame(&Envelope::push("forward_push", json!({})))).await;
        door.handle_frame(peer, &frame(&Envelope::push("whatever", json!({})))).await;

        assert!(rx.try_recv().is_err());
    }
}
