//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// WorkBridge - workspace context for browser clients
#[derive(Parser)]
#[command(
    name = "wb",
    about = "Serve workspace context from one or more editor windows over a local socket",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a window: Primary if none is running, otherwise Secondary
    Serve {
        /// Workspace folder to serve (repeatable, replaces configured folders)
        #[arg(short, long = "folder", value_name = "PATH")]
        folders: Vec<PathBuf>,

        /// Window id (defaults to a generated one)
        #[arg(short, long)]
        window_id: Option<String>,

        /// Canonical port to probe and bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one request to the running Primary and print the reply
    Request {
        /// Command name, e.g. get_file_tree or search_workspace
        command: String,

        /// JSON payload
        #[arg(short = 'd', long, default_value = "{}")]
        payload: String,
    },

    /// Send a snippet to a browser tab
    Snippet {
        /// Target tab id
        #[arg(short, long)]
        tab: Option<i64>,

        /// Snippet text (defaults to the serving window's selection)
        #[arg(short = 'x', long)]
        text: Option<String>,
    },

    /// Show the Primary's windows and folders
    Details,
}
