//! get_file_tree - folder trees of this window

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};

/// Tree of one requested folder, or of every open folder
pub struct FileTreeCommand;

#[async_trait]
impl CommandHandler for FileTreeCommand {
    fn name(&self) -> &'static str {
        "get_file_tree"
    }

    async fn execute(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!(?payload, "FileTreeCommand::execute: called");
        let folders = match ctx.folder_arg(&payload)? {
            Some(folder) => vec![folder],
            None => ctx.collaborators.workspace.list_open_folders(),
        };

        let mut trees = Vec::with_capacity(folders.len());
        for folder in &folders {
            let tree = ctx.collaborators.files.tree(folder)?;
            let tree = serde_json::to_value(tree).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
            trees.push(ctx.tag(tree));
        }

        debug!(tree_count = %trees.len(), "FileTreeCommand::execute: done");
        Ok(CommandOutput::data(Value::Array(trees)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::testing::context_for;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_tree_of_all_folders() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join("a.rs"), "").unwrap();
        fs::write(b.path().join("b.rs"), "").unwrap();

        let ctx = context_for(vec![a.path().to_path_buf(), b.path().to_path_buf()], true);
        let out = FileTreeCommand.execute(json!({}), &ctx).await.unwrap();

        let trees = out.data.as_array().unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0]["window_id"], "w-test");
        assert_eq!(trees[0]["children"][0]["name"], "a.rs");
    }

    #[tokio::test]
    async fn test_unknown_folder_fails() {
        let a = TempDir::new().unwrap();
        let ctx = context_for(vec![a.path().to_path_buf()], true);

        let err = FileTreeCommand
            .execute(json!({"folder": "no-such-folder"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownFolder(_)));
    }
}
