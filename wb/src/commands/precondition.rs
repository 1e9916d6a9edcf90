//! Workspace precondition

use thiserror::Error;

use crate::protocol::ErrorCode;
use crate::providers::WorkspaceProvider;

/// Reasons a workspace command may not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("No workspace folder is open")]
    NoWorkspaceOpen,

    #[error("Workspace is not trusted")]
    NotTrusted,
}

impl PreconditionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoWorkspaceOpen => ErrorCode::NoWorkspaceOpen,
            Self::NotTrusted => ErrorCode::WorkspaceNotTrusted,
        }
    }
}

/// At least one folder must be open and the workspace trusted
pub fn check_workspace(workspace: &dyn WorkspaceProvider) -> Result<(), PreconditionError> {
    if workspace.list_open_folders().is_empty() {
        return Err(PreconditionError::NoWorkspaceOpen);
    }
    if !workspace.is_trusted() {
        return Err(PreconditionError::NotTrusted);
    }
    Ok(())
}
