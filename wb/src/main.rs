//! WorkBridge - workspace context for browser clients
//!
//! CLI entry point: run a window, or talk to the running Primary.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result, eyre};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use workbridge::cli::{Cli, Command};
use workbridge::config::Config;
use workbridge::protocol::{ControlCommand, SnippetPayload};
use workbridge::{Bridge, BridgeClient, Collaborators, Role};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: &str) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("workbridge")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > INFO
    let level_str = cli_log_level.unwrap_or(config_log_level);
    let level = match level_str.to_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        other => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("workbridge.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), &config.log_level).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve {
            folders,
            window_id,
            port,
        } => cmd_serve(config, folders, window_id, port).await,
        Command::Request { command, payload } => cmd_request(&config, &command, &payload).await,
        Command::Snippet { tab, text } => cmd_snippet(&config, tab, text).await,
        Command::Details => cmd_request(&config, ControlCommand::GetWorkspaceDetails.as_str(), "{}").await,
    }
}

/// Run a window until Ctrl+C; a Secondary that loses its Primary re-runs the election
async fn cmd_serve(
    mut config: Config,
    folders: Vec<PathBuf>,
    window_id: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    debug!(?folders, ?window_id, ?port, "cmd_serve: called");
    if !folders.is_empty() {
        config.workspace.folders = folders;
    }
    if let Some(port) = port {
        config.bridge.canonical_port = port;
    }
    // Keep one id across re-elections
    config.bridge.window_id = Some(window_id.or(config.bridge.window_id.take()).unwrap_or_else(|| {
        format!("window-{}", uuid::Uuid::now_v7())
    }));
    config.validate().context("Invalid configuration")?;

    let collaborators = Collaborators::local(&config);

    loop {
        let bridge = match Bridge::start(&config, collaborators.clone()).await {
            Ok(bridge) => bridge,
            Err(e) => {
                error!(error = %e, "Failed to start bridge");
                return Err(e);
            }
        };
        println!(
            "{} window {} on port {}",
            bridge.role().as_str(),
            bridge.window_id(),
            bridge.port()
        );

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Ctrl+C received, shutting down");
                bridge.shutdown().await;
                return Ok(());
            }
            _ = bridge.wait_link_lost(), if bridge.role() == Role::Secondary => {
                warn!("Primary went away, running the election again");
                bridge.shutdown().await;
            }
        }
    }
}

async fn connect(config: &Config) -> Result<BridgeClient> {
    BridgeClient::discover(&config.bridge.host, config.bridge.canonical_port, config.bridge.port_range)
        .await
        .context("Is a window running? Start one with `wb serve`")
}

/// Send one request and print the reply payload
async fn cmd_request(config: &Config, command: &str, payload: &str) -> Result<()> {
    debug!(%command, "cmd_request: called");
    let payload: Value = serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let mut client = connect(config).await?;
    let reply = client.request(command, payload).await?;
    println!("{}", serde_json::to_string_pretty(&reply.payload)?);

    if reply.payload["success"] != true {
        return Err(eyre!(
            "{} failed: {}",
            command,
            reply.payload["error"].as_str().unwrap_or("unknown error")
        ));
    }
    Ok(())
}

/// Ask the Primary to push a snippet to a tab
async fn cmd_snippet(config: &Config, tab: Option<i64>, text: Option<String>) -> Result<()> {
    debug!(?tab, "cmd_snippet: called");
    let mut payload = json!({ "target_tab_id": tab });
    if let Some(text) = text {
        payload["snippet"] = serde_json::to_value(SnippetPayload {
            text,
            ..Default::default()
        })?;
    }

    let mut client = connect(config).await?;
    let reply = client
        .request(ControlCommand::SendSnippet.as_str(), payload)
        .await?;

    match reply.payload["data"]["delivered"].as_bool() {
        Some(true) => println!("Snippet delivered"),
        Some(false) => println!("No matching tab, snippet dropped"),
        None => println!("{}", serde_json::to_string_pretty(&reply.payload)?),
    }
    Ok(())
}
