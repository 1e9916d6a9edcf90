//! get_active_file_info - the focused editor

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};

pub struct ActiveFileCommand;

#[async_trait]
impl CommandHandler for ActiveFileCommand {
    fn name(&self) -> &'static str {
        "get_active_file_info"
    }

    async fn execute(&self, _payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!("ActiveFileCommand::execute: called");
        let data = match ctx.collaborators.editor.active_file() {
            Some(file) => {
                let file = serde_json::to_value(file).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
                ctx.tag(file)
            }
            None => Value::Null,
        };
        Ok(CommandOutput::data(data))
    }
}
