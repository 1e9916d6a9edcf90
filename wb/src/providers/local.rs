//! Filesystem-backed workspace, file and editor providers

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry as WalkEntry, WalkDir};

use super::uri::{relative, to_path, to_uri};
use super::{
    DirEntry, EditorStateProvider, FileDataProvider, FileNode, OpenFile, ProviderError, SnippetExtractor,
    WorkspaceFolder, WorkspaceProvider,
};
use crate::protocol::SnippetPayload;

/// Compiled exclusion globs
///
/// A pattern matches either an entry's file name or its path relative to
/// the folder root.
#[derive(Debug, Clone, Default)]
pub(super) struct ExcludeSet {
    patterns: Vec<glob::Pattern>,
}

impl ExcludeSet {
    pub(super) fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub(super) fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let rel = relative(root, path);
        self.patterns.iter().any(|p| p.matches(&name) || p.matches(&rel))
    }

    /// WalkDir filter that prunes excluded entries below `root`
    pub(super) fn keep<'a>(&'a self, root: &'a Path) -> impl FnMut(&WalkEntry) -> bool + 'a {
        move |entry| entry.depth() == 0 || !self.is_excluded(root, entry.path())
    }
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Language id guessed from a file extension
pub(super) fn language_for(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    let lang = match ext {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "md" => "markdown",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "sh" => "shellscript",
        _ => return None,
    };
    Some(lang.to_string())
}

/// Workspace made of configured folders
pub struct LocalWorkspace {
    folders: Vec<WorkspaceFolder>,
    trusted: bool,
    exclude: Vec<String>,
}

impl LocalWorkspace {
    pub fn new(folders: Vec<PathBuf>, trusted: bool, exclude: Vec<String>) -> Self {
        debug!(?folders, %trusted, "LocalWorkspace::new: called");
        let folders = folders
            .into_iter()
            .map(|p| {
                let path = canonical(&p);
                WorkspaceFolder {
                    name: folder_name(&path),
                    uri: to_uri(&path),
                    path,
                }
            })
            .collect();
        Self {
            folders,
            trusted,
            exclude,
        }
    }
}

impl WorkspaceProvider for LocalWorkspace {
    fn list_open_folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.clone()
    }

    fn resolve_folder_for_uri(&self, uri: &str) -> Option<WorkspaceFolder> {
        let path = canonical(&to_path(uri));
        // Deepest folder wins when folders nest
        self.folders
            .iter()
            .filter(|f| path.starts_with(&f.path))
            .max_by_key(|f| f.path.components().count())
            .cloned()
    }

    fn is_trusted(&self) -> bool {
        self.trusted
    }

    fn exclude_patterns(&self) -> Vec<String> {
        self.exclude.clone()
    }
}

/// Reads trees, files and directories straight from disk
pub struct LocalFiles {
    exclude: ExcludeSet,
    max_depth: usize,
}

impl LocalFiles {
    pub fn new(exclude: &[String]) -> Self {
        Self {
            exclude: ExcludeSet::new(exclude),
            max_depth: 32,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl FileDataProvider for LocalFiles {
    fn tree(&self, folder: &WorkspaceFolder) -> Result<FileNode, ProviderError> {
        debug!(folder = %folder.uri, "LocalFiles::tree: called");
        if !folder.path.is_dir() {
            return Err(ProviderError::NotADirectory {
                uri: folder.uri.clone(),
            });
        }

        let root = FileNode {
            name: folder.name.clone(),
            path: String::new(),
            uri: folder.uri.clone(),
            is_directory: true,
            children: Vec::new(),
        };

        // Pre-order walk; stack[d] is the open directory at depth d
        let mut stack = vec![root];
        let walker = WalkDir::new(&folder.path)
            .min_depth(1)
            .max_depth(self.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(self.exclude.keep(&folder.path))
            .filter_map(|e| e.ok());

        for entry in walker {
            while stack.len() > entry.depth() {
                close_top(&mut stack);
            }

            let node = FileNode {
                name: entry.file_name().to_string_lossy().to_string(),
                path: relative(&folder.path, entry.path()),
                uri: to_uri(entry.path()),
                is_directory: entry.file_type().is_dir(),
                children: Vec::new(),
            };

            if node.is_directory {
                stack.push(node);
            } else if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }

        while stack.len() > 1 {
            close_top(&mut stack);
        }

        stack.pop().ok_or_else(|| ProviderError::NotFound {
            uri: folder.uri.clone(),
        })
    }

    fn content(&self, uri: &str) -> Result<String, ProviderError> {
        debug!(%uri, "LocalFiles::content: called");
        let path = to_path(uri);
        if path.is_dir() {
            return Err(ProviderError::NotFound { uri: uri.to_string() });
        }
        let bytes = std::fs::read(&path).map_err(|e| ProviderError::from_io(uri, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn list_directory(&self, uri: &str) -> Result<Vec<DirEntry>, ProviderError> {
        debug!(%uri, "LocalFiles::list_directory: called");
        let path = to_path(uri);
        if !path.exists() {
            return Err(ProviderError::NotFound { uri: uri.to_string() });
        }
        if !path.is_dir() {
            return Err(ProviderError::NotADirectory { uri: uri.to_string() });
        }

        let entries = WalkDir::new(&path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(self.exclude.keep(&path))
            .filter_map(|e| e.ok())
            .map(|e| DirEntry {
                name: e.file_name().to_string_lossy().to_string(),
                uri: to_uri(e.path()),
                is_directory: e.file_type().is_dir(),
            })
            .collect();

        Ok(entries)
    }
}

fn close_top(stack: &mut Vec<FileNode>) {
    if let Some(done) = stack.pop()
        && let Some(parent) = stack.last_mut()
    {
        parent.children.push(done);
    }
}

/// Editor state fixed at startup
pub struct StaticEditor {
    active: Option<PathBuf>,
    open: Vec<PathBuf>,
}

impl StaticEditor {
    pub fn new(active: Option<PathBuf>, open: Vec<PathBuf>) -> Self {
        Self { active, open }
    }

    fn describe(path: &Path) -> OpenFile {
        OpenFile {
            uri: to_uri(path),
            name: folder_name(path),
            language: language_for(path),
        }
    }
}

impl EditorStateProvider for StaticEditor {
    fn active_file(&self) -> Option<OpenFile> {
        self.active.as_deref().map(Self::describe)
    }

    fn open_files(&self) -> Vec<OpenFile> {
        self.open.iter().map(|p| Self::describe(p)).collect()
    }
}

/// A selection fixed at startup (or none)
pub struct StaticSnippet {
    selection: Option<SnippetPayload>,
}

impl StaticSnippet {
    pub fn new(selection: Option<SnippetPayload>) -> Self {
        Self { selection }
    }
}

impl SnippetExtractor for StaticSnippet {
    fn current_selection(&self) -> Option<SnippetPayload> {
        self.selection.clone()
    }
}
