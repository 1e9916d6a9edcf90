//! Command handler trait

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{CommandContext, CommandError};
use crate::aggregation::AggregationStrategy;

/// A workspace command
///
/// Handlers are stateless and may run concurrently for independent requests.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Wire name of the command
    fn name(&self) -> &'static str;

    /// Whether the workspace precondition must pass before `execute`
    fn requires_workspace(&self) -> bool {
        true
    }

    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::First
    }

    async fn execute(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutput, CommandError>;
}

/// Successful handler result
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub data: Value,
    /// Per-item failures of batched commands
    pub errors: Option<Vec<Value>>,
}

impl CommandOutput {
    pub fn data(data: Value) -> Self {
        Self { data, errors: None }
    }

    pub fn batch(data: Vec<Value>, errors: Vec<Value>) -> Self {
        Self {
            data: Value::Array(data),
            errors: Some(errors),
        }
    }

    /// `{success: true, data}` plus `errors` for batched output
    pub fn into_payload(self) -> Value {
        match self.errors {
            Some(errors) => json!({ "success": true, "data": self.data, "errors": errors }),
            None => json!({ "success": true, "data": self.data }),
        }
    }
}
