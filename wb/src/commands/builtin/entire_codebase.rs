//! get_entire_codebase - every non-excluded file of every open folder

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::aggregation::AggregationStrategy;
use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};
use crate::providers::FileNode;

pub struct EntireCodebaseCommand;

fn collect_files<'a>(node: &'a FileNode, out: &mut Vec<&'a FileNode>) {
    for child in &node.children {
        if child.is_directory {
            collect_files(child, out);
        } else {
            out.push(child);
        }
    }
}

#[async_trait]
impl CommandHandler for EntireCodebaseCommand {
    fn name(&self) -> &'static str {
        "get_entire_codebase"
    }

    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::MergeWithErrors
    }

    async fn execute(&self, _payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!("EntireCodebaseCommand::execute: called");
        let mut data = Vec::new();
        let mut errors = Vec::new();

        for folder in ctx.collaborators.workspace.list_open_folders() {
            let tree = match ctx.collaborators.files.tree(&folder) {
                Ok(tree) => tree,
                Err(e) => {
                    errors.push(ctx.tag(json!({ "uri": folder.uri, "error": e.to_string() })));
                    continue;
                }
            };

            let mut files = Vec::new();
            collect_files(&tree, &mut files);
            for file in files {
                match ctx.collaborators.files.content(&file.uri) {
                    Ok(content) => data.push(ctx.tag(json!({
                        "uri": file.uri,
                        "path": file.path,
                        "folder": folder.name,
                        "content": content,
                    }))),
                    Err(e) => errors.push(ctx.tag(json!({ "uri": file.uri, "error": e.to_string() }))),
                }
            }
        }

        debug!(found = %data.len(), failed = %errors.len(), "EntireCodebaseCommand::execute: done");
        Ok(CommandOutput::batch(data, errors))
    }
}
