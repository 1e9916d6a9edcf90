//! Command error types

use thiserror::Error;

use crate::providers::ProviderError;

/// Errors a handler can fail with; reported as `COMMAND_EXECUTION_ERROR`
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Folder not open in this window: {0}")]
    UnknownFolder(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
