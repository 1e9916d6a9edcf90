//! get_open_files - editors open in this window

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::aggregation::AggregationStrategy;
use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};

pub struct OpenFilesCommand;

#[async_trait]
impl CommandHandler for OpenFilesCommand {
    fn name(&self) -> &'static str {
        "get_open_files"
    }

    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::Merge { field: "files" }
    }

    async fn execute(&self, _payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!("OpenFilesCommand::execute: called");
        let files: Vec<Value> = ctx
            .collaborators
            .editor
            .open_files()
            .into_iter()
            .filter_map(|f| serde_json::to_value(f).ok())
            .map(|f| ctx.tag(f))
            .collect();
        Ok(CommandOutput::data(json!({ "files": files })))
    }
}
