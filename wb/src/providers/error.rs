//! Provider error types

use thiserror::Error;

/// Errors raised by workspace collaborators
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Not found: {uri}")]
    NotFound { uri: String },

    #[error("Not a directory: {uri}")]
    NotADirectory { uri: String },

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("IO error on {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    /// Map an IO error on `uri`, keeping "not found" distinct
    pub fn from_io(uri: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { uri: uri.to_string() }
        } else {
            Self::Io {
                uri: uri.to_string(),
                source,
            }
        }
    }
}
