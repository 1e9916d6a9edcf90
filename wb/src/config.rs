//! WorkBridge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;

/// Main WorkBridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: String,

    /// Election and transport settings
    pub bridge: BridgeConfig,

    /// Aggregation settings
    pub coordinator: CoordinatorConfig,

    /// Folders served by this window
    pub workspace: WorkspaceConfig,

    /// Editor state reported by this window
    pub editor: EditorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bridge: BridgeConfig::default(),
            coordinator: CoordinatorConfig::default(),
            workspace: WorkspaceConfig::default(),
            editor: EditorConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.bridge.port_range == 0 {
            return Err(eyre::eyre!("bridge.port-range must be at least 1"));
        }
        if self.coordinator.aggregation_timeout_ms == 0 {
            return Err(eyre::eyre!("coordinator.aggregation-timeout-ms must be greater than zero"));
        }
        if self.coordinator.channel_buffer == 0 {
            return Err(eyre::eyre!("coordinator.channel-buffer must be greater than zero"));
        }
        if self.bridge.max_frame_bytes == 0 {
            return Err(eyre::eyre!("bridge.max-frame-bytes must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .workbridge.yml
        let local_config = PathBuf::from(".workbridge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/workbridge/workbridge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("workbridge").join("workbridge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Election and transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Loopback address to bind and probe
    pub host: String,

    /// Port probed first; the Primary binds the first free port from here
    #[serde(rename = "canonical-port")]
    pub canonical_port: u16,

    /// Number of consecutive ports tried
    #[serde(rename = "port-range")]
    pub port_range: u16,

    /// Stable id of this window; generated at startup when unset
    #[serde(rename = "window-id")]
    pub window_id: Option<String>,

    /// Frames above this size close the connection
    #[serde(rename = "max-frame-bytes")]
    pub max_frame_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            canonical_port: 55155,
            port_range: 10,
            window_id: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Folders served by this window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub folders: Vec<PathBuf>,

    /// Untrusted workspaces refuse every workspace command
    pub trusted: bool,

    /// Glob patterns left out of trees, codebase dumps and search
    pub exclude: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            trusted: true,
            exclude: vec![".git".to_string(), "target".to_string(), "node_modules".to_string()],
        }
    }
}

/// Editor state reported by this window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    #[serde(rename = "active-file")]
    pub active_file: Option<PathBuf>,

    #[serde(rename = "open-files")]
    pub open_files: Vec<PathBuf>,

    /// Text reported as the current selection
    pub selection: Option<String>,
}
