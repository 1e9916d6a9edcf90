//! Workspace collaborators
//!
//! Command handlers reach the editor's workspace only through these traits.
//! The filesystem-backed implementations in [`local`] and [`search`] make the
//! binary usable without an editor attached.

mod error;
mod local;
mod search;
pub mod uri;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::protocol::SnippetPayload;

pub use error::ProviderError;
pub use local::{LocalFiles, LocalWorkspace, StaticEditor, StaticSnippet};
pub use search::GrepSearch;

/// One root folder open in this window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub name: String,
    pub uri: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Node of a folder tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    /// Relative to the workspace folder
    pub path: String,
    pub uri: String,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

/// Entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub uri: String,
    pub is_directory: bool,
}

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub uri: String,
    /// Relative to the workspace folder that contains the file
    pub path: String,
    pub line: u64,
    pub preview: String,
}

/// A file the editor has open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Open folders, trust and exclusion rules of this window
pub trait WorkspaceProvider: Send + Sync {
    fn list_open_folders(&self) -> Vec<WorkspaceFolder>;

    /// Folder containing `uri`, if it belongs to this window
    fn resolve_folder_for_uri(&self, uri: &str) -> Option<WorkspaceFolder>;

    fn is_trusted(&self) -> bool;

    /// Glob patterns excluded from trees, codebase dumps and search
    fn exclude_patterns(&self) -> Vec<String>;
}

/// File trees, contents and directory listings
pub trait FileDataProvider: Send + Sync {
    fn tree(&self, folder: &WorkspaceFolder) -> Result<FileNode, ProviderError>;

    fn content(&self, uri: &str) -> Result<String, ProviderError>;

    fn list_directory(&self, uri: &str) -> Result<Vec<DirEntry>, ProviderError>;
}

/// Full-text search over the workspace
pub trait SearchProvider: Send + Sync {
    /// Search `scope`, or every open folder when `scope` is `None`
    fn search(
        &self,
        query: &str,
        scope: Option<&WorkspaceFolder>,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError>;
}

/// The editor's current selection
pub trait SnippetExtractor: Send + Sync {
    fn current_selection(&self) -> Option<SnippetPayload>;
}

/// Active and open editors
pub trait EditorStateProvider: Send + Sync {
    fn active_file(&self) -> Option<OpenFile>;

    fn open_files(&self) -> Vec<OpenFile>;
}

/// The set of collaborators one window runs against
#[derive(Clone)]
pub struct Collaborators {
    pub workspace: Arc<dyn WorkspaceProvider>,
    pub files: Arc<dyn FileDataProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub snippets: Arc<dyn SnippetExtractor>,
    pub editor: Arc<dyn EditorStateProvider>,
}

impl Collaborators {
    /// Filesystem-backed collaborators built from configuration
    pub fn local(config: &Config) -> Self {
        let workspace = Arc::new(LocalWorkspace::new(
            config.workspace.folders.clone(),
            config.workspace.trusted,
            config.workspace.exclude.clone(),
        ));
        let files = Arc::new(LocalFiles::new(&config.workspace.exclude));
        let search = Arc::new(GrepSearch::new(workspace.clone(), &config.workspace.exclude));
        let editor = StaticEditor::new(config.editor.active_file.clone(), config.editor.open_files.clone());
        let snippets = StaticSnippet::new(config.editor.selection.as_ref().map(|text| SnippetPayload {
            text: text.clone(),
            file_path: config
                .editor
                .active_file
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            language: config.editor.active_file.as_deref().and_then(local::language_for),
            ..Default::default()
        }));

        Self {
            workspace,
            files,
            search,
            snippets: Arc::new(snippets),
            editor: Arc::new(editor),
        }
    }
}
