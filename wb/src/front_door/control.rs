//! Control command handlers
//!
//! These run on the dispatcher task and never touch the workspace providers,
//! except `send_snippet` falling back to the current editor selection.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{FrontDoor, wrong_role};
use crate::coordinator::{RegistrationError, Role, WindowInfo};
use crate::protocol::{
    ControlCommand, Envelope, ErrorCode, ForwardedResponse, RegisterTargetPayload, SecondaryPayload, SnippetPayload,
    SnippetRelay, error_payload, success_payload,
};
use crate::transport::PeerId;

/// Payload of `send_snippet`; without `snippet` the editor selection is sent
#[derive(Debug, Deserialize)]
struct SendSnippetPayload {
    #[serde(default)]
    snippet: Option<SnippetPayload>,

    #[serde(default)]
    window_id: Option<String>,

    #[serde(default)]
    target_tab_id: Option<i64>,
}

fn decode<T: DeserializeOwned>(env: &Envelope) -> Result<T, Value> {
    serde_json::from_value(env.payload.clone()).map_err(|e| {
        error_payload(
            ErrorCode::InvalidPayload,
            format!("Invalid {} payload: {e}", env.command),
        )
    })
}

/// Apply a control command and return the reply payload
pub(super) async fn handle(door: &FrontDoor, peer: PeerId, control: ControlCommand, env: &Envelope) -> Value {
    debug!(%peer, command = %control.as_str(), "control::handle: called");
    let result = match control {
        ControlCommand::RegisterTarget => register_target(door, peer, env),
        ControlCommand::GetWorkspaceDetails => workspace_details(door).await,
        ControlCommand::RegisterSecondary => register_secondary(door, peer, env).await,
        ControlCommand::UnregisterSecondary => unregister_secondary(door, peer, env).await,
        ControlCommand::ForwardResponse => forward_response(door, peer, env).await,
        ControlCommand::ForwardPush => forward_push(door, peer, env).await,
        ControlCommand::SendSnippet => send_snippet(door, env).await,
    };
    result.unwrap_or_else(|failure| failure)
}

fn register_target(door: &FrontDoor, peer: PeerId, env: &Envelope) -> Result<Value, Value> {
    let target: RegisterTargetPayload = decode(env)?;
    let bound = door.transport.update_meta(peer, |meta| {
        meta.active_tab_id = target.tab_id;
        meta.active_host = target.host.clone();
        if target.window_id.is_some() {
            meta.window_id = target.window_id.clone();
        }
    });
    if !bound {
        return Err(error_payload(ErrorCode::CommandExecutionError, "Peer is no longer connected"));
    }

    info!(%peer, tab_id = ?target.tab_id, host = ?target.host, window_id = ?target.window_id, "Target registered");
    Ok(success_payload(json!({
        "tab_id": target.tab_id,
        "host": target.host,
        "window_id": target.window_id,
    })))
}

async fn workspace_details(door: &FrontDoor) -> Result<Value, Value> {
    let workspace = &door.collaborators.workspace;
    let windows = match door.role {
        Role::Primary => door
            .coordinator
            .windows()
            .await
            .map_err(|e| error_payload(ErrorCode::CommandExecutionError, e.to_string()))?,
        Role::Secondary => vec![WindowInfo {
            window_id: door.window_id.clone(),
            role: Role::Secondary.as_str().to_string(),
            peer: None,
        }],
    };

    Ok(success_payload(json!({
        "window_id": door.window_id,
        "role": door.role.as_str(),
        "folders": workspace.list_open_folders(),
        "trusted": workspace.is_trusted(),
        "windows": windows,
    })))
}

async fn register_secondary(door: &FrontDoor, peer: PeerId, env: &Envelope) -> Result<Value, Value> {
    if door.role != Role::Primary {
        return Err(wrong_role(&env.command, door.role));
    }
    let secondary: SecondaryPayload = decode(env)?;

    let total = door
        .coordinator
        .register_secondary(peer, &secondary.window_id)
        .await
        .map_err(|e| match e.downcast_ref::<RegistrationError>() {
            Some(refused) => error_payload(ErrorCode::InvalidPayload, refused.to_string()),
            None => error_payload(ErrorCode::CommandExecutionError, e.to_string()),
        })?;
    Ok(success_payload(json!({
        "window_id": secondary.window_id,
        "registered_secondaries": total,
    })))
}

async fn unregister_secondary(door: &FrontDoor, peer: PeerId, env: &Envelope) -> Result<Value, Value> {
    if door.role != Role::Primary {
        return Err(wrong_role(&env.command, door.role));
    }
    let secondary: SecondaryPayload = decode(env)?;

    let removed = door
        .coordinator
        .unregister_secondary(peer, &secondary.window_id)
        .await
        .map_err(|e| error_payload(ErrorCode::CommandExecutionError, e.to_string()))?;
    Ok(success_payload(json!({
        "window_id": secondary.window_id,
        "removed": removed,
    })))
}

/// The registered window of `peer`, or an error when it is not a Secondary
fn secondary_window(door: &FrontDoor, peer: PeerId, env: &Envelope) -> Result<Option<String>, Value> {
    match door.transport.meta(peer) {
        Some(meta) if meta.is_secondary => Ok(meta.window_id),
        _ => {
            warn!(%peer, command = %env.command, "Relay from a peer that is not a registered secondary");
            Err(error_payload(
                ErrorCode::CommandExecutionError,
                format!("{} accepted from registered secondaries only", env.command),
            ))
        }
    }
}

async fn forward_response(door: &FrontDoor, peer: PeerId, env: &Envelope) -> Result<Value, Value> {
    if door.role != Role::Primary {
        return Err(wrong_role(&env.command, door.role));
    }
    let registered = secondary_window(door, peer, env)?;
    let forwarded: ForwardedResponse = decode(env)?;
    let window_id = registered.unwrap_or(forwarded.window_id);

    door.coordinator
        .contribute(&forwarded.original_message_id, &window_id, forwarded.response)
        .await
        .map_err(|e| error_payload(ErrorCode::CommandExecutionError, e.to_string()))?;
    Ok(success_payload(Value::Null))
}

async fn forward_push(door: &FrontDoor, peer: PeerId, env: &Envelope) -> Result<Value, Value> {
    if door.role != Role::Primary {
        return Err(wrong_role(&env.command, door.role));
    }
    secondary_window(door, peer, env)?;
    let relay: SnippetRelay = decode(env)?;
    deliver(door, relay).await
}

async fn send_snippet(door: &FrontDoor, env: &Envelope) -> Result<Value, Value> {
    let request: SendSnippetPayload = decode(env)?;
    let snippet = match request.snippet {
        Some(snippet) => snippet,
        None => door.collaborators.snippets.current_selection().ok_or_else(|| {
            error_payload(ErrorCode::InvalidPayload, "No snippet given and nothing is selected")
        })?,
    };

    let relay = SnippetRelay {
        window_id: request.window_id.or_else(|| Some(door.window_id.clone())),
        target_tab_id: request.target_tab_id,
        snippet,
    };

    deliver(door, relay).await
}

async fn deliver(door: &FrontDoor, relay: SnippetRelay) -> Result<Value, Value> {
    let target_tab_id = relay.target_tab_id;
    let delivered = door
        .relay_snippet(relay)
        .await
        .map_err(|e| error_payload(ErrorCode::CommandExecutionError, e.to_string()))?;
    Ok(success_payload(json!({
        "delivered": delivered,
        "target_tab_id": target_tab_id,
    })))
}
