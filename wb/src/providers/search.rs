//! Literal full-text search using the ripgrep libraries

use std::sync::Arc;

use grep_regex::RegexMatcherBuilder;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use tracing::debug;
use walkdir::WalkDir;

use super::local::ExcludeSet;
use super::uri::{relative, to_uri};
use super::{ProviderError, SearchHit, SearchProvider, WorkspaceFolder, WorkspaceProvider};

/// Searches the folders of a workspace for a literal string
pub struct GrepSearch {
    workspace: Arc<dyn WorkspaceProvider>,
    exclude: ExcludeSet,
}

impl GrepSearch {
    pub fn new(workspace: Arc<dyn WorkspaceProvider>, exclude: &[String]) -> Self {
        Self {
            workspace,
            exclude: ExcludeSet::new(exclude),
        }
    }
}

impl SearchProvider for GrepSearch {
    fn search(
        &self,
        query: &str,
        scope: Option<&WorkspaceFolder>,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        debug!(%query, scope = ?scope.map(|f| &f.uri), %max_results, "GrepSearch::search: called");
        if query.is_empty() {
            return Err(ProviderError::InvalidQuery("query is empty".to_string()));
        }

        let matcher = RegexMatcherBuilder::new()
            .case_smart(true)
            .build(&regex::escape(query))
            .map_err(|e| ProviderError::InvalidQuery(e.to_string()))?;

        let folders = match scope {
            Some(folder) => vec![folder.clone()],
            None => self.workspace.list_open_folders(),
        };

        let mut searcher = SearcherBuilder::new()
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .line_number(true)
            .build();

        let mut hits = Vec::new();
        'folders: for folder in &folders {
            let files = WalkDir::new(&folder.path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(self.exclude.keep(&folder.path))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file());

            for file in files {
                if hits.len() >= max_results {
                    break 'folders;
                }

                let uri = to_uri(file.path());
                let path = relative(&folder.path, file.path());
                let result = searcher.search_path(
                    &matcher,
                    file.path(),
                    UTF8(|line_num, line| {
                        hits.push(SearchHit {
                            uri: uri.clone(),
                            path: path.clone(),
                            line: line_num,
                            preview: line.trim_end().to_string(),
                        });
                        Ok(hits.len() < max_results)
                    }),
                );

                if let Err(e) = result {
                    debug!(file = %uri, error = %e, "GrepSearch::search: skipping unreadable file");
                }
            }
        }

        debug!(hit_count = %hits.len(), "GrepSearch::search: done");
        Ok(hits)
    }
}
