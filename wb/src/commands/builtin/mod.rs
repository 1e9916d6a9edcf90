//! Built-in workspace commands

mod active_file;
mod entire_codebase;
mod file_content;
mod file_tree;
mod filter_info;
mod folder_content;
mod open_files;
mod search;

pub use active_file::ActiveFileCommand;
pub use entire_codebase::EntireCodebaseCommand;
pub use file_content::FileContentCommand;
pub use file_tree::FileTreeCommand;
pub use filter_info::FilterInfoCommand;
pub use folder_content::FolderContentCommand;
pub use open_files::OpenFilesCommand;
pub use search::SearchWorkspaceCommand;
