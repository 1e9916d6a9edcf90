//! BridgeClient - async client for the Primary's socket
//!
//! Used by the CLI and the integration tests. Frames are read by a background
//! task, so waiting with a timeout never tears a frame in half.

use std::collections::VecDeque;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::coordinator::candidate_ports;
use crate::protocol::{ControlCommand, DEFAULT_MAX_FRAME_BYTES, Envelope, MessageType, read_frame, write_frame};
use crate::transport::{ConnectOutcome, Transport};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A connection to a running Primary
pub struct BridgeClient {
    port: u16,
    timeout: Duration,
    writer: OwnedWriteHalf,
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
    reader: JoinHandle<()>,
    /// Pushes received while waiting for a reply
    pushes: VecDeque<Envelope>,
    /// Replies received while waiting for another message id
    replies: VecDeque<Envelope>,
}

impl BridgeClient {
    /// Connect to `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        debug!(%host, %port, "BridgeClient::connect: called");
        let stream = TcpStream::connect((host, port))
            .await
            .context(format!("Failed to connect to {host}:{port}"))?;
        Ok(Self::from_stream(stream, port))
    }

    /// Find the Primary among `[canonical, canonical + range)`
    ///
    /// A port only counts when it answers `get_workspace_details` as Primary.
    pub async fn discover(host: &str, canonical: u16, range: u16) -> Result<Self> {
        debug!(%host, %canonical, %range, "BridgeClient::discover: called");
        let ports = candidate_ports(canonical, range);
        for port in &ports {
            let ConnectOutcome::Connected(stream) = Transport::connect_to(host, *port).await else {
                continue;
            };

            let mut client = Self::from_stream(stream, *port).with_timeout(PROBE_TIMEOUT);
            let probe = client
                .request(ControlCommand::GetWorkspaceDetails.as_str(), json!({}))
                .await;
            match probe {
                Ok(reply) if reply.payload["data"]["role"] == "primary" => {
                    return Ok(client.with_timeout(DEFAULT_TIMEOUT));
                }
                Ok(_) => debug!(%port, "BridgeClient::discover: not a primary"),
                Err(e) => debug!(%port, error = %e, "BridgeClient::discover: probe failed"),
            }
        }
        Err(eyre!("No running Primary found on ports {ports:?}"))
    }

    fn from_stream(stream: TcpStream, port: u16) -> Self {
        let (mut read_half, writer) = stream.into_split();
        let (tx, frames) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half, DEFAULT_MAX_FRAME_BYTES).await {
                    Ok(Some(frame)) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(error = %e, "BridgeClient: read failed");
                        break;
                    }
                }
            }
        });

        Self {
            port,
            timeout: DEFAULT_TIMEOUT,
            writer,
            frames,
            reader,
            pushes: VecDeque::new(),
            replies: VecDeque::new(),
        }
    }

    /// How long to wait for replies and pushes
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send a request and wait for the reply with the same message id
    pub async fn request(&mut self, command: &str, payload: Value) -> Result<Envelope> {
        let env = Envelope::new_request(command, payload);
        self.send_envelope(&env).await?;
        self.wait_for(&env.message_id).await
    }

    pub async fn send_envelope(&mut self, env: &Envelope) -> Result<()> {
        debug!(command = %env.command, message_id = %env.message_id, "BridgeClient::send_envelope: called");
        let bytes = env.to_bytes().context("Failed to encode envelope")?;
        self.send_raw(&bytes).await
    }

    /// Write one frame with an arbitrary body
    pub async fn send_raw(&mut self, body: &[u8]) -> Result<()> {
        write_frame(&mut self.writer, body)
            .await
            .context("Failed to send frame")
    }

    /// Next envelope of any kind, bypassing the buffers
    pub async fn next_envelope(&mut self) -> Result<Envelope> {
        self.recv_within(self.timeout)
            .await?
            .ok_or_else(|| eyre!("Timed out after {:?} waiting for a message", self.timeout))
    }

    /// Next envelope within `wait`, or `None` if nothing arrived
    pub async fn recv_within(&mut self, wait: Duration) -> Result<Option<Envelope>> {
        match tokio::time::timeout(wait, self.frames.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(eyre!("Connection closed by bridge")),
            Ok(Some(frame)) => Envelope::from_slice(&frame)
                .map(Some)
                .context("Bridge sent an invalid envelope"),
        }
    }

    /// Wait for the reply to `message_id`, buffering everything else
    pub async fn wait_for(&mut self, message_id: &str) -> Result<Envelope> {
        if let Some(pos) = self.replies.iter().position(|e| e.message_id == message_id) {
            return self
                .replies
                .remove(pos)
                .ok_or_else(|| eyre!("Buffered reply vanished"));
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(env) = self.recv_within(remaining).await? else {
                return Err(eyre!("Timed out waiting for reply to {message_id}"));
            };

            match env.kind {
                MessageType::Push => self.pushes.push_back(env),
                _ if env.message_id == message_id => return Ok(env),
                _ => self.replies.push_back(env),
            }
        }
    }

    /// Next push, buffering replies that arrive first
    pub async fn next_push(&mut self) -> Result<Envelope> {
        if let Some(env) = self.pushes.pop_front() {
            return Ok(env);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(env) = self.recv_within(remaining).await? else {
                return Err(eyre!("Timed out waiting for a push"));
            };

            if env.kind == MessageType::Push {
                return Ok(env);
            }
            self.replies.push_back(env);
        }
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
