//! get_folder_content - every file below a folder

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::aggregation::AggregationStrategy;
use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};
use crate::providers::uri::{relative, to_path};

/// Recursively reads the folder at `{uri}`
pub struct FolderContentCommand;

#[async_trait]
impl CommandHandler for FolderContentCommand {
    fn name(&self) -> &'static str {
        "get_folder_content"
    }

    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::MergeWithErrors
    }

    async fn execute(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!(?payload, "FolderContentCommand::execute: called");
        let uri = payload
            .get("uri")
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingParameter("uri"))?;

        let Some(folder) = ctx.collaborators.workspace.resolve_folder_for_uri(uri) else {
            debug!(%uri, "FolderContentCommand::execute: not in this window");
            return Ok(CommandOutput::batch(vec![], vec![]));
        };

        let files = &ctx.collaborators.files;
        let mut data = Vec::new();
        let mut errors = Vec::new();
        let mut pending = vec![uri.to_string()];

        while let Some(dir) = pending.pop() {
            let entries = match files.list_directory(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    errors.push(ctx.tag(json!({ "uri": dir, "error": e.to_string() })));
                    continue;
                }
            };

            for entry in entries {
                if entry.is_directory {
                    pending.push(entry.uri);
                    continue;
                }
                match files.content(&entry.uri) {
                    Ok(content) => data.push(ctx.tag(json!({
                        "uri": entry.uri,
                        "path": relative(&folder.path, &to_path(&entry.uri)),
                        "content": content,
                    }))),
                    Err(e) => errors.push(ctx.tag(json!({ "uri": entry.uri, "error": e.to_string() }))),
                }
            }
        }

        debug!(found = %data.len(), failed = %errors.len(), "FolderContentCommand::execute: done");
        Ok(CommandOutput::batch(data, errors))
    }
}
