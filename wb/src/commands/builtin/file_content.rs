//! get_file_content - contents of one or more files

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::aggregation::AggregationStrategy;
use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};
use crate::providers::uri::{relative, to_path};

/// Reads `{uris: [...]}` or `{uri}`
///
/// URIs outside this window's folders are skipped so that a broadcast
/// union is not flooded with "not mine" errors from other windows.
pub struct FileContentCommand;

fn requested_uris(payload: &Value) -> Result<Vec<String>, CommandError> {
    if let Some(uris) = payload.get("uris") {
        let uris = uris
            .as_array()
            .ok_or_else(|| CommandError::InvalidArgument("uris must be an array".to_string()))?;
        return uris
            .iter()
            .map(|u| {
                u.as_str()
                    .map(String::from)
                    .ok_or_else(|| CommandError::InvalidArgument("uris must contain strings".to_string()))
            })
            .collect();
    }

    match payload.get("uri").and_then(Value::as_str) {
        Some(uri) => Ok(vec![uri.to_string()]),
        None => Err(CommandError::MissingParameter("uris")),
    }
}

#[async_trait]
impl CommandHandler for FileContentCommand {
    fn name(&self) -> &'static str {
        "get_file_content"
    }

    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::MergeWithErrors
    }

    async fn execute(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!(?payload, "FileContentCommand::execute: called");
        let uris = requested_uris(&payload)?;

        let mut data = Vec::new();
        let mut errors = Vec::new();
        for uri in uris {
            let Some(folder) = ctx.collaborators.workspace.resolve_folder_for_uri(&uri) else {
                debug!(%uri, "FileContentCommand::execute: not in this window, skipping");
                continue;
            };

            match ctx.collaborators.files.content(&uri) {
                Ok(content) => data.push(ctx.tag(json!({
                    "uri": uri,
                    "path": relative(&folder.path, &to_path(&uri)),
                    "content": content,
                }))),
                Err(e) => errors.push(ctx.tag(json!({ "uri": uri, "error": e.to_string() }))),
            }
        }

        debug!(found = %data.len(), failed = %errors.len(), "FileContentCommand::execute: done");
        Ok(CommandOutput::batch(data, errors))
    }
}
