//! CommandRegistry - command name to handler lookup

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::builtin::{
    ActiveFileCommand, EntireCodebaseCommand, FileContentCommand, FileTreeCommand, FilterInfoCommand,
    FolderContentCommand, OpenFilesCommand, SearchWorkspaceCommand,
};
use super::{CommandContext, CommandHandler, PreconditionError, check_workspace};
use crate::aggregation::StrategyTable;
use crate::protocol::{ErrorCode, error_payload};

/// Registered workspace commands
#[derive(Clone)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Registry with every built-in workspace command
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(FileTreeCommand));
        registry.register(Arc::new(FileContentCommand));
        registry.register(Arc::new(FolderContentCommand));
        registry.register(Arc::new(EntireCodebaseCommand));
        registry.register(Arc::new(SearchWorkspaceCommand));
        registry.register(Arc::new(ActiveFileCommand));
        registry.register(Arc::new(OpenFilesCommand));
        registry.register(Arc::new(FilterInfoCommand));

        registry
    }

    /// Create an empty registry (for testing)
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        debug!(name = %handler.name(), "CommandRegistry::register: called");
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered command names, sorted
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Aggregation strategy of every registered command
    pub fn strategies(&self) -> StrategyTable {
        self.handlers
            .iter()
            .map(|(name, handler)| (name.clone(), handler.strategy()))
            .collect()
    }

    /// Run the workspace precondition if `name` requires it
    pub fn precondition(&self, name: &str, ctx: &CommandContext) -> Result<(), PreconditionError> {
        match self.handlers.get(name) {
            Some(handler) if handler.requires_workspace() => check_workspace(ctx.collaborators.workspace.as_ref()),
            _ => Ok(()),
        }
    }

    /// Execute a handler without the precondition, returning a wire payload
    pub async fn invoke(&self, name: &str, payload: Value, ctx: &CommandContext) -> Value {
        debug!(%name, window_id = %ctx.window_id, "CommandRegistry::invoke: called");
        let Some(handler) = self.get(name) else {
            return error_payload(ErrorCode::UnknownCommand, format!("Unknown command: {name}"));
        };

        match handler.execute(payload, ctx).await {
            Ok(output) => output.into_payload(),
            Err(e) => {
                warn!(%name, error = %e, "Command failed");
                error_payload(ErrorCode::CommandExecutionError, e.to_string())
            }
        }
    }

    /// Precondition then handler, returning a wire payload
    pub async fn execute(&self, name: &str, payload: Value, ctx: &CommandContext) -> Value {
        if let Err(e) = self.precondition(name, ctx) {
            debug!(%name, error = %e, "CommandRegistry::execute: precondition failed");
            return error_payload(e.code(), e.to_string());
        }
        self.invoke(name, payload, ctx).await
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationStrategy;
    use crate::commands::builtin::testing::context_for;
    use crate::commands::{CommandError, CommandOutput};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_standard_registry_has_workspace_commands() {
        let registry = CommandRegistry::standard();
        assert_eq!(
            registry.command_names(),
            vec![
                "get_active_file_info",
                "get_entire_codebase",
                "get_file_content",
                "get_file_tree",
                "get_filter_info",
                "get_folder_content",
                "get_open_files",
                "search_workspace",
            ]
        );
    }

    #[test]
    fn test_strategy_table() {
        let table = CommandRegistry::standard().strategies();
        assert_eq!(table.get("get_file_tree"), AggregationStrategy::First);
        assert_eq!(table.get("get_file_content"), AggregationStrategy::MergeWithErrors);
        assert_eq!(table.get("get_folder_content"), AggregationStrategy::MergeWithErrors);
        assert_eq!(table.get("get_entire_codebase"), AggregationStrategy::MergeWithErrors);
        assert_eq!(
            table.get("search_workspace"),
            AggregationStrategy::Merge { field: "results" }
        );
        assert_eq!(table.get("get_open_files"), AggregationStrategy::Merge { field: "files" });
        assert_eq!(table.get("get_active_file_info"), AggregationStrategy::First);
        assert_eq!(table.get("get_filter_info"), AggregationStrategy::First);
    }

    struct CountingCommand {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CommandHandler for CountingCommand {
        fn name(&self) -> &'static str {
            "count"
        }

        async fn execute(
            &self,
            _payload: Value,
            _ctx: &CommandContext,
        ) -> Result<CommandOutput, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CommandError::InvalidArgument("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_precondition_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::empty();
        registry.register(Arc::new(CountingCommand { calls: calls.clone() }));

        let ctx = context_for(vec![], true);
        let out = registry.execute("count", json!({}), &ctx).await;

        assert_eq!(out["errorCode"], "NO_WORKSPACE_OPEN");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_is_execution_error() {
        let temp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::empty();
        registry.register(Arc::new(CountingCommand { calls: calls.clone() }));

        let ctx = context_for(vec![temp.path().to_path_buf()], true);
        let out = registry.execute("count", json!({}), &ctx).await;

        assert_eq!(out["success"], false);
        assert_eq!(out["errorCode"], "COMMAND_EXECUTION_ERROR");
        assert_eq!(out["error"], "Invalid argument: boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let ctx = context_for(vec![], true);
        let out = CommandRegistry::empty().invoke("nope", json!({}), &ctx).await;
        assert_eq!(out["errorCode"], "UNKNOWN_COMMAND");
    }
}
