//! search_workspace - literal text search

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::aggregation::AggregationStrategy;
use crate::commands::{CommandContext, CommandError, CommandHandler, CommandOutput};

const DEFAULT_MAX_RESULTS: usize = 100;

/// `{query, folder?, max_results?}` → `{results: [...]}`
pub struct SearchWorkspaceCommand;

#[async_trait]
impl CommandHandler for SearchWorkspaceCommand {
    fn name(&self) -> &'static str {
        "search_workspace"
    }

    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::Merge { field: "results" }
    }

    async fn execute(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError> {
        debug!(?payload, "SearchWorkspaceCommand::execute: called");
        let query = payload
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.is_empty())
            .ok_or(CommandError::MissingParameter("query"))?;
        let max_results = payload
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        let scope = ctx.folder_arg(&payload)?;

        let hits = ctx.collaborators.search.search(query, scope.as_ref(), max_results)?;
        let results: Vec<Value> = hits
            .into_iter()
            .filter_map(|hit| serde_json::to_value(hit).ok())
            .map(|hit| ctx.tag(hit))
            .collect();

        debug!(result_count = %results.len(), "SearchWorkspaceCommand::execute: done");
        Ok(CommandOutput::data(json!({ "query": query, "results": results })))
    }
}
