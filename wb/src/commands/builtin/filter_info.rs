//! get_filter_info - exclusion rules in effect

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};

pub struct FilterInfoCommand;

#[async_trait]
impl CommandHandler for FilterInfoCommand {
    fn name(&self) -> &'static str {
        "get_filter_info"
    }

    async fn execute(&self, _payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!("FilterInfoCommand::execute: called");
        let workspace = &ctx.collaborators.workspace;
        Ok(CommandOutput::data(ctx.tag(json!({
            "exclude": workspace.exclude_patterns(),
            "folders": workspace
                .list_open_folders()
                .into_iter()
                .map(|f| f.uri)
                .collect::<Vec<_>>(),
        }))))
    }
}
