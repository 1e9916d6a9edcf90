//! `file://` URI helpers

use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// `file://` URI for a filesystem path
pub fn to_uri(path: &Path) -> String {
    format!("{FILE_SCHEME}{}", path.to_string_lossy())
}

/// Filesystem path named by a URI; bare paths pass through unchanged
pub fn to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri))
}

/// Path of `path` relative to `root`, with forward slashes
pub fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
