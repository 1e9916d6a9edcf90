//! Control commands and relay payloads
//!
//! Control commands never touch the workspace. They register peers, relay
//! results between windows and carry snippets toward browser tabs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command name of the push delivered to external clients
pub const SNIPPET_PUSH: &str = "snippet";

/// Commands handled by the front door itself rather than the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    RegisterTarget,
    GetWorkspaceDetails,
    RegisterSecondary,
    UnregisterSecondary,
    ForwardResponse,
    ForwardPush,
    SendSnippet,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 7] = [
        Self::RegisterTarget,
        Self::GetWorkspaceDetails,
        Self::RegisterSecondary,
        Self::UnregisterSecondary,
        Self::ForwardResponse,
        Self::ForwardPush,
        Self::SendSnippet,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterTarget => "register_target",
            Self::GetWorkspaceDetails => "get_workspace_details",
            Self::RegisterSecondary => "register_secondary",
            Self::UnregisterSecondary => "unregister_secondary",
            Self::ForwardResponse => "forward_response",
            Self::ForwardPush => "forward_push",
            Self::SendSnippet => "send_snippet",
        }
    }
}

/// Payload of `register_target`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterTargetPayload {
    #[serde(default)]
    pub tab_id: Option<i64>,

    #[serde(default)]
    pub host: Option<String>,

    /// Binds the peer to one window; its requests are then routed there only
    #[serde(default)]
    pub window_id: Option<String>,
}

/// Payload of `register_secondary` and `unregister_secondary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryPayload {
    pub window_id: String,
}

/// Payload of the `forward_response` push a Secondary sends to the Primary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedResponse {
    /// The aggregation id the Primary used as message id when forwarding
    pub original_message_id: String,
    pub window_id: String,
    pub response: Value,
}

/// Selected text plus where it came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetPayload {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u64>,
}

/// Payload of `forward_push` and `send_snippet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetRelay {
    #[serde(default)]
    pub window_id: Option<String>,

    #[serde(default)]
    pub target_tab_id: Option<i64>,

    pub snippet: SnippetPayload,
}
