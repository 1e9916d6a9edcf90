//! CommandContext - what a handler runs against

use serde_json::Value;
use tracing::debug;

use super::CommandError;
use crate::providers::{Collaborators, WorkspaceFolder};
use crate::transport::PeerMeta;

/// Execution context for one request in one window
#[derive(Clone)]
pub struct CommandContext {
    /// Window executing the command
    pub window_id: String,

    /// Metadata of the requesting peer, if it is still connected
    pub peer: Option<PeerMeta>,

    pub collaborators: Collaborators,
}

impl CommandContext {
    pub fn new(window_id: impl Into<String>, peer: Option<PeerMeta>, collaborators: Collaborators) -> Self {
        let window_id = window_id.into();
        debug!(%window_id, "CommandContext::new: called");
        Self {
            window_id,
            peer,
            collaborators,
        }
    }

    /// Resolve an optional `folder` parameter given as a URI or a folder name
    ///
    /// `Ok(None)` means no folder was requested.
    pub fn folder_arg(&self, payload: &Value) -> Result<Option<WorkspaceFolder>, CommandError> {
        let Some(wanted) = payload.get("folder").and_then(Value::as_str) else {
            return Ok(None);
        };
        debug!(%wanted, "CommandContext::folder_arg: resolving");

        let workspace = &self.collaborators.workspace;
        workspace
            .list_open_folders()
            .into_iter()
            .find(|f| f.name == wanted || f.uri == wanted)
            .or_else(|| workspace.resolve_folder_for_uri(wanted))
            .map(Some)
            .ok_or_else(|| CommandError::UnknownFolder(wanted.to_string()))
    }

    /// Set `window_id` on an object item
    pub fn tag(&self, mut item: Value) -> Value {
        if let Some(obj) = item.as_object_mut() {
            obj.insert("window_id".to_string(), Value::String(self.window_id.clone()));
        }
        item
    }
}
