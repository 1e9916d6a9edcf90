//! Error codes carried in `errorCode` of failure payloads

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame is not a JSON object or lacks a required envelope field
    InvalidMessageFormat,
    UnsupportedProtocolVersion,
    InvalidMessageType,
    UnknownCommand,
    /// A relay or registration payload is missing a required field
    InvalidPayload,
    NoWorkspaceOpen,
    WorkspaceNotTrusted,
    CommandExecutionError,
    /// A broadcast finished without collecting a single response
    NoResponses,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessageFormat => "INVALID_MESSAGE_FORMAT",
            Self::UnsupportedProtocolVersion => "UNSUPPORTED_PROTOCOL_VERSION",
            Self::InvalidMessageType => "INVALID_MESSAGE_TYPE",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::NoWorkspaceOpen => "NO_WORKSPACE_OPEN",
            Self::WorkspaceNotTrusted => "WORKSPACE_NOT_TRUSTED",
            Self::CommandExecutionError => "COMMAND_EXECUTION_ERROR",
            Self::NoResponses => "NO_RESPONSES",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
