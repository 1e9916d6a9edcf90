//! Integration tests for WorkBridge
//!
//! Real bridges talking over loopback TCP. Each test picks its own free port
//! and uses short aggregation timeouts.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tempfile::TempDir;
use workbridge::config::Config;
use workbridge::protocol::{Envelope, ForwardedResponse, MessageType, PROTOCOL_VERSION};
use workbridge::{Bridge, BridgeClient, Collaborators, CoordinatorMetrics, Role};

const HOST: &str = "127.0.0.1";
const TIMEOUT_MS: u64 = 400;

// =============================================================================
// Helpers
// =============================================================================

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind((HOST, 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

/// A temp folder holding one file
fn workspace(file: &str, contents: &str) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp.path().join(file), contents).unwrap();
    temp
}

fn config(port: u16, window_id: &str, folders: Vec<PathBuf>) -> Config {
    let mut config = Config::default();
    config.bridge.host = HOST.to_string();
    config.bridge.canonical_port = port;
    config.bridge.port_range = 1;
    config.bridge.window_id = Some(window_id.to_string());
    config.coordinator.aggregation_timeout_ms = TIMEOUT_MS;
    config.workspace.folders = folders;
    config
}

async fn start(config: &Config) -> Bridge {
    Bridge::start(config, Collaborators::local(config))
        .await
        .expect("Failed to start bridge")
}

/// Poll the coordinator until `check` holds
async fn wait_until(bridge: &Bridge, check: impl Fn(&CoordinatorMetrics) -> bool) -> CoordinatorMetrics {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let metrics = bridge.coordinator().metrics().await.unwrap();
        if check(&metrics) {
            return metrics;
        }
        assert!(Instant::now() < deadline, "condition not reached: {metrics:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn client(bridge: &Bridge) -> BridgeClient {
    BridgeClient::connect(HOST, bridge.port())
        .await
        .unwrap()
        .with_timeout(Duration::from_secs(5))
}

/// A raw client that registers as a Secondary and never answers
async fn ghost(bridge: &Bridge, window_id: &str) -> BridgeClient {
    let mut ghost = client(bridge).await;
    let reply = ghost
        .request("register_secondary", json!({ "window_id": window_id }))
        .await
        .unwrap();
    assert_eq!(reply.payload["success"], true);
    ghost
}

fn result_windows(reply: &Envelope) -> Vec<String> {
    let mut windows: Vec<String> = reply.payload["data"]["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["window_id"].as_str().unwrap().to_string())
        .collect();
    windows.sort();
    windows
}

// =============================================================================
// Election Tests
// =============================================================================

#[tokio::test]
async fn test_second_window_becomes_secondary() {
    let port = free_port().await;
    let ws = workspace("a.txt", "alpha\n");

    let primary = start(&config(port, "w-primary", vec![ws.path().to_path_buf()])).await;
    let secondary = start(&config(port, "w-secondary", vec![ws.path().to_path_buf()])).await;

    assert_eq!(primary.role(), Role::Primary);
    assert!(primary.is_listening());
    assert_eq!(secondary.role(), Role::Secondary);
    assert!(!secondary.is_listening());
    assert_eq!(secondary.port(), port);

    wait_until(&primary, |m| m.registered_secondaries == 1).await;
    assert_eq!(primary.peer_count(), 1);
    assert_eq!(secondary.peer_count(), 1);
    let windows = primary.coordinator().windows().await.unwrap();
    let ids: Vec<&str> = windows.iter().map(|w| w.window_id.as_str()).collect();
    assert_eq!(ids, vec!["w-primary", "w-secondary"]);

    secondary.shutdown().await;
    primary.shutdown().await;
}

#[tokio::test]
async fn test_workspace_details_lists_windows() {
    let port = free_port().await;
    let ws = workspace("a.txt", "alpha\n");

    let primary = start(&config(port, "w-primary", vec![ws.path().to_path_buf()])).await;
    let secondary = start(&config(port, "w-secondary", vec![])).await;
    wait_until(&primary, |m| m.registered_secondaries == 1).await;

    let mut client = BridgeClient::discover(HOST, port, 1).await.unwrap();
    let reply = client.request("get_workspace_details", json!({})).await.unwrap();

    assert_eq!(reply.kind, MessageType::Response);
    let data = &reply.payload["data"];
    assert_eq!(data["window_id"], "w-primary");
    assert_eq!(data["role"], "primary");
    assert_eq!(data["trusted"], true);
    assert_eq!(data["folders"].as_array().unwrap().len(), 1);
    assert_eq!(data["windows"].as_array().unwrap().len(), 2);
    assert_eq!(data["windows"][1]["role"], "secondary");

    secondary.shutdown().await;
    primary.shutdown().await;
}

// =============================================================================
// Protocol Error Tests
// =============================================================================

#[tokio::test]
async fn test_protocol_errors_keep_connection_open() {
    let port = free_port().await;
    let ws = workspace("a.txt", "alpha\n");
    let primary = start(&config(port, "w-primary", vec![ws.path().to_path_buf()])).await;
    let mut client = client(&primary).await;

    // Not JSON
    client.send_raw(b"not json").await.unwrap();
    let reply = client.next_envelope().await.unwrap();
    assert_eq!(reply.kind, MessageType::ErrorResponse);
    assert_eq!(reply.error_code(), Some("INVALID_MESSAGE_FORMAT"));

    // Wrong protocol version
    let mut env = Envelope::request("m-version", "get_file_tree", json!({}));
    env.protocol_version = "2.0".to_string();
    client.send_envelope(&env).await.unwrap();
    let reply = client.wait_for("m-version").await.unwrap();
    assert_eq!(reply.error_code(), Some("UNSUPPORTED_PROTOCOL_VERSION"));

    // Unknown type
    let raw = json!({
        "protocol_version": PROTOCOL_VERSION,
        "message_id": "m-type",
        "type": "gossip",
        "command": "get_file_tree",
        "payload": {},
    });
    client.send_raw(raw.to_string().as_bytes()).await.unwrap();
    let reply = client.wait_for("m-type").await.unwrap();
    assert_eq!(reply.error_code(), Some("INVALID_MESSAGE_TYPE"));

    // Unknown command
    let reply = client.request("make_coffee", json!({})).await.unwrap();
    assert_eq!(reply.kind, MessageType::ErrorResponse);
    assert_eq!(reply.command, "make_coffee");
    assert_eq!(reply.error_code(), Some("UNKNOWN_COMMAND"));

    // Still usable
    let reply = client.request("get_filter_info", json!({})).await.unwrap();
    assert_eq!(reply.kind, MessageType::Response);

    primary.shutdown().await;
}

#[tokio::test]
async fn test_preconditions() {
    let port = free_port().await;
    let primary = start(&config(port, "w-empty", vec![])).await;
    let mut client = client(&primary).await;

    let reply = client.request("get_file_tree", json!({})).await.unwrap();
    assert_eq!(reply.kind, MessageType::ErrorResponse);
    assert_eq!(reply.error_code(), Some("NO_WORKSPACE_OPEN"));

    // Control commands are not gated
    let reply = client.request("get_workspace_details", json!({})).await.unwrap();
    assert_eq!(reply.payload["success"], true);
    primary.shutdown().await;

    let port = free_port().await;
    let ws = workspace("a.txt", "alpha\n");
    let mut untrusted = config(port, "w-untrusted", vec![ws.path().to_path_buf()]);
    untrusted.workspace.trusted = false;
    let primary = start(&untrusted).await;
    let mut client = crate::client(&primary).await;

    let reply = client.request("search_workspace", json!({"query": "alpha"})).await.unwrap();
    assert_eq!(reply.error_code(), Some("WORKSPACE_NOT_TRUSTED"));
    primary.shutdown().await;
}

#[tokio::test]
async fn test_register_secondary_requires_window_id() {
    let port = free_port().await;
    let primary = start(&config(port, "w-primary", vec![])).await;
    let mut client = client(&primary).await;

    let reply = client.request("register_secondary", json!({})).await.unwrap();
    assert_eq!(reply.kind, MessageType::ErrorResponse);
    assert_eq!(reply.error_code(), Some("INVALID_PAYLOAD"));

    primary.shutdown().await;
}

// =============================================================================
// Aggregation Tests
// =============================================================================

#[tokio::test]
async fn test_search_merges_every_window() {
    let port = free_port().await;
    let ws_primary = workspace("readme.txt", "nothing to see\n");
    let ws_left = workspace("left.rs", "fn main() {}\n");
    let ws_right = workspace("right.rs", "// main\n");

    let primary = start(&config(port, "w-primary", vec![ws_primary.path().to_path_buf()])).await;
    let left = start(&config(port, "w-left", vec![ws_left.path().to_path_buf()])).await;
    let right = start(&config(port, "w-right", vec![ws_right.path().to_path_buf()])).await;
    wait_until(&primary, |m| m.registered_secondaries == 2).await;

    let mut client = client(&primary).await;
    let started = Instant::now();
    let reply = client.request("search_workspace", json!({"query": "main"})).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(TIMEOUT_MS), "answered before the deadline");
    assert_eq!(reply.kind, MessageType::Response);
    assert_eq!(reply.payload["data"]["query"], "main");
    assert_eq!(result_windows(&reply), vec!["w-left", "w-right"]);

    // Exactly one reply for the message id
    assert!(client.recv_within(Duration::from_millis(200)).await.unwrap().is_none());

    let metrics = primary.coordinator().metrics().await.unwrap();
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.partial_timeouts, 0);

    right.shutdown().await;
    left.shutdown().await;
    primary.shutdown().await;
}

#[tokio::test]
async fn test_file_content_batches_across_windows() {
    let port = free_port().await;
    let ws_primary = workspace("a.txt", "alpha\n");
    let ws_secondary = workspace("b.txt", "beta\n");

    let primary = start(&config(port, "w-primary", vec![ws_primary.path().to_path_buf()])).await;
    let secondary = start(&config(port, "w-secondary", vec![ws_secondary.path().to_path_buf()])).await;
    wait_until(&primary, |m| m.registered_secondaries == 1).await;

    let uri_a = format!("file://{}", fs::canonicalize(ws_primary.path().join("a.txt")).unwrap().display());
    let uri_b = format!("file://{}", fs::canonicalize(ws_secondary.path().join("b.txt")).unwrap().display());

    let mut client = client(&primary).await;
    let reply = client
        .request("get_file_content", json!({"uris": [uri_a, uri_b]}))
        .await
        .unwrap();

    assert_eq!(reply.payload["success"], true);
    let mut contents: Vec<&str> = reply.payload["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["content"].as_str().unwrap())
        .collect();
    contents.sort();
    assert_eq!(contents, vec!["alpha\n", "beta\n"]);

    secondary.shutdown().await;
    primary.shutdown().await;
}

#[tokio::test]
async fn test_bound_client_reaches_only_its_window() {
    let port = free_port().await;
    let ws_primary = workspace("p.rs", "fn main() {}\n");
    let ws_secondary = workspace("s.rs", "fn main() {}\n");

    let primary = start(&config(port, "w-primary", vec![ws_primary.path().to_path_buf()])).await;
    let secondary = start(&config(port, "w-secondary", vec![ws_secondary.path().to_path_buf()])).await;
    wait_until(&primary, |m| m.registered_secondaries == 1).await;

    let mut client = client(&primary).await;
    let reply = client
        .request("register_target", json!({"tab_id": 1, "window_id": "w-secondary"}))
        .await
        .unwrap();
    assert_eq!(reply.payload["success"], true);

    let reply = client.request("search_workspace", json!({"query": "main"})).await.unwrap();
    assert_eq!(result_windows(&reply), vec!["w-secondary"]);

    secondary.shutdown().await;
    primary.shutdown().await;
}

// =============================================================================
// Timeout and Disconnect Tests
// =============================================================================

#[tokio::test]
async fn test_silent_secondary_yields_partial_result() {
    let port = free_port().await;
    let ws_primary = workspace("readme.txt", "nothing to see\n");
    let ws_left = workspace("left.rs", "fn main() {}\n");

    let primary = start(&config(port, "w-primary", vec![ws_primary.path().to_path_buf()])).await;
    let left = start(&config(port, "w-left", vec![ws_left.path().to_path_buf()])).await;
    let mut silent = ghost(&primary, "w-silent").await;
    wait_until(&primary, |m| m.registered_secondaries == 2).await;

    let mut client = client(&primary).await;
    let started = Instant::now();
    let reply = client.request("search_workspace", json!({"query": "main"})).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(TIMEOUT_MS - 50));
    assert_eq!(reply.payload["success"], true);
    assert_eq!(result_windows(&reply), vec!["w-left"]);

    // The silent window did receive the forwarded request
    let forwarded = silent.next_envelope().await.unwrap();
    assert_eq!(forwarded.kind, MessageType::Request);
    assert_eq!(forwarded.command, "search_workspace");

    // Answering after the deadline changes nothing for the client
    let late = ForwardedResponse {
        original_message_id: forwarded.message_id.clone(),
        window_id: "w-silent".to_string(),
        response: json!({"success": true, "data": {"query": "main", "results": [{"path": "late.rs"}]}}),
    };
    silent
        .send_envelope(&Envelope::push("forward_response", serde_json::to_value(&late).unwrap()))
        .await
        .unwrap();

    let metrics = wait_until(&primary, |m| m.late_contributions == 1).await;
    assert_eq!(metrics.partial_timeouts, 1);
    assert!(client.recv_within(Duration::from_millis(200)).await.unwrap().is_none());

    left.shutdown().await;
    primary.shutdown().await;
}

#[tokio::test]
async fn test_secondary_disconnecting_before_answering() {
    let port = free_port().await;
    let ws_primary = workspace("readme.txt", "nothing to see\n");
    let ws_left = workspace("left.rs", "fn main() {}\n");

    let primary = start(&config(port, "w-primary", vec![ws_primary.path().to_path_buf()])).await;
    let left = start(&config(port, "w-left", vec![ws_left.path().to_path_buf()])).await;
    let mut doomed = ghost(&primary, "w-doomed").await;
    wait_until(&primary, |m| m.registered_secondaries == 2).await;

    let mut client = client(&primary).await;
    let request = Envelope::new_request("search_workspace", json!({"query": "main"}));
    client.send_envelope(&request).await.unwrap();

    let forwarded = doomed.next_envelope().await.unwrap();
    assert_eq!(forwarded.command, "search_workspace");
    drop(doomed);

    let reply = client.wait_for(&request.message_id).await.unwrap();
    assert_eq!(result_windows(&reply), vec!["w-left"]);

    let metrics = wait_until(&primary, |m| m.registered_secondaries == 1).await;
    assert_eq!(metrics.partial_timeouts, 1);

    left.shutdown().await;
    primary.shutdown().await;
}

#[tokio::test]
async fn test_departed_secondaries_leave_the_registry() {
    let port = free_port().await;
    let ws_primary = workspace("p.rs", "fn main() {}\n");
    let ws_left = workspace("left.rs", "fn main() {}\n");

    let primary = start(&config(port, "w-primary", vec![ws_primary.path().to_path_buf()])).await;
    let left = start(&config(port, "w-left", vec![ws_left.path().to_path_buf()])).await;
    let crashed = ghost(&primary, "w-crashed").await;
    wait_until(&primary, |m| m.registered_secondaries == 2).await;

    // Orderly shutdown unregisters, a dropped socket is noticed by the transport
    left.shutdown().await;
    drop(crashed);
    wait_until(&primary, |m| m.registered_secondaries == 0).await;

    let windows = primary.coordinator().windows().await.unwrap();
    assert_eq!(windows.len(), 1);

    // Later requests are answered locally, without waiting for anyone
    let mut client = client(&primary).await;
    let started = Instant::now();
    let reply = client.request("search_workspace", json!({"query": "main"})).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(TIMEOUT_MS));
    assert_eq!(result_windows(&reply), vec!["w-primary"]);

    primary.shutdown().await;
}

// =============================================================================
// Snippet Relay Tests
// =============================================================================

#[tokio::test]
async fn test_snippet_reaches_the_target_tab() {
    let port = free_port().await;
    let ws = workspace("main.rs", "fn main() {}\n");

    let primary = start(&config(port, "w-primary", vec![ws.path().to_path_buf()])).await;
    let mut secondary_config = config(port, "w-secondary", vec![ws.path().to_path_buf()]);
    secondary_config.editor.selection = Some("let answer = 42;".to_string());
    let secondary = start(&secondary_config).await;
    wait_until(&primary, |m| m.registered_secondaries == 1).await;

    let mut tab = client(&primary).await;
    let reply = tab
        .request("register_target", json!({"tab_id": 7, "host": "chat.example.com"}))
        .await
        .unwrap();
    assert_eq!(reply.payload["success"], true);

    // From a Secondary's selection, through the Primary
    assert!(secondary.send_snippet(Some(7)).await.unwrap());
    let push = tab.next_push().await.unwrap();
    assert_eq!(push.kind, MessageType::Push);
    assert_eq!(push.command, "snippet");
    assert_eq!(push.payload["text"], "let answer = 42;");
    wait_until(&primary, |m| m.snippets_delivered == 1).await;

    // From a client, with explicit text
    let mut sender = client(&primary).await;
    let reply = sender
        .request("send_snippet", json!({"target_tab_id": 7, "snippet": {"text": "hello"}}))
        .await
        .unwrap();
    assert_eq!(reply.payload["data"]["delivered"], true);
    let push = tab.next_push().await.unwrap();
    assert_eq!(push.payload["text"], "hello");

    // No such tab
    let reply = sender
        .request("send_snippet", json!({"target_tab_id": 99, "snippet": {"text": "lost"}}))
        .await
        .unwrap();
    assert_eq!(reply.payload["data"]["delivered"], false);
    wait_until(&primary, |m| m.snippets_dropped == 1).await;

    secondary.shutdown().await;
    primary.shutdown().await;
}

#[tokio::test]
async fn test_relay_pushes_from_clients_are_ignored() {
    let port = free_port().await;
    let ws = workspace("main.rs", "fn main() {}\n");
    let primary = start(&config(port, "w-primary", vec![ws.path().to_path_buf()])).await;

    let mut tab = client(&primary).await;
    tab.request("register_target", json!({"tab_id": 3})).await.unwrap();

    // A plain client is not a registered secondary
    let mut impostor = client(&primary).await;
    let relay = json!({"target_tab_id": 3, "snippet": {"text": "spoofed"}});
    impostor
        .send_envelope(&Envelope::push("forward_push", relay))
        .await
        .unwrap();

    let nothing: Option<Value> = tab
        .recv_within(Duration::from_millis(300))
        .await
        .unwrap()
        .map(|env| env.payload);
    assert!(nothing.is_none());

    primary.shutdown().await;
}
