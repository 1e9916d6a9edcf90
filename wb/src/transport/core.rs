//! Connection table and public transport API

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::connection::{read_loop, write_loop};
use super::error::TransportError;
use super::peer::{PeerId, PeerMeta, TransportEvent};
use crate::protocol::Envelope;

/// Result of probing a port for an existing listener
#[derive(Debug)]
pub enum ConnectOutcome {
    Connected(TcpStream),
    /// Nothing is listening on the port
    Refused,
    Failed(std::io::Error),
}

/// Upper bound on flushing a peer's queue during `close`
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub(super) struct PeerEntry {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    meta: PeerMeta,
    reader: Option<AbortHandle>,
    writer: Option<JoinHandle<()>>,
}

impl PeerEntry {
    fn new(outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            outbound,
            meta: PeerMeta::default(),
            reader: None,
            writer: None,
        }
    }

    /// Stop reading, then let the writer drain what is already queued
    async fn shutdown(self) {
        let Self {
            outbound,
            reader,
            writer,
            ..
        } = self;
        drop(outbound);
        if let Some(reader) = reader {
            reader.abort();
        }
        if let Some(writer) = writer
            && tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, writer).await.is_err()
        {
            debug!("PeerEntry::shutdown: writer did not drain in time");
        }
    }
}

pub(super) struct Inner {
    peers: Mutex<HashMap<PeerId, PeerEntry>>,
    next_id: AtomicU64,
    events: mpsc::Sender<TransportEvent>,
    /// Address of the listener handed to `serve`, if any
    listen_addr: Mutex<Option<SocketAddr>>,
    pub(super) max_frame_bytes: usize,
}

impl Inner {
    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, PeerEntry>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) async fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Remove a peer after a socket failure and report it
    ///
    /// Only the caller that actually removes the entry emits `Closed`, so a
    /// peer is reported at most once.
    pub(super) async fn drop_peer(&self, peer: PeerId, error: Option<String>, abort_reader: bool) {
        let removed = self.peers().remove(&peer);
        let Some(entry) = removed else {
            debug!(%peer, "drop_peer: already removed");
            return;
        };

        if abort_reader && let Some(reader) = entry.reader {
            reader.abort();
        }

        debug!(%peer, ?error, "drop_peer: peer removed");
        self.emit(TransportEvent::Closed {
            peer,
            meta: entry.meta,
            error,
        })
        .await;
    }
}

/// Cloneable handle onto one transport instance
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Create a transport and the receiver for its events
    pub fn new(max_frame_bytes: usize, event_buffer: usize) -> (Self, mpsc::Receiver<TransportEvent>) {
        debug!(%max_frame_bytes, %event_buffer, "Transport::new: called");
        let (events, rx) = mpsc::channel(event_buffer);
        let inner = Inner {
            peers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            events,
            listen_addr: Mutex::new(None),
            max_frame_bytes,
        };
        (Self { inner: Arc::new(inner) }, rx)
    }

    /// Bind the first free port among `ports`
    ///
    /// `AddrInUse` moves on to the next candidate; any other bind error is
    /// returned immediately.
    pub async fn listen(host: &str, ports: &[u16]) -> Result<(TcpListener, u16), TransportError> {
        debug!(%host, ?ports, "Transport::listen: called");
        for &port in ports {
            match TcpListener::bind((host, port)).await {
                Ok(listener) => {
                    info!(%host, %port, "Listening");
                    return Ok((listener, port));
                }
                Err(e) if e.kind() == ErrorKind::AddrInUse => {
                    debug!(%port, "Transport::listen: port in use, trying next");
                }
                Err(source) => return Err(TransportError::Bind { port, source }),
            }
        }

        Err(TransportError::PortsExhausted { ports: ports.to_vec() })
    }

    /// Probe `host:port` for a listener
    pub async fn connect_to(host: &str, port: u16) -> ConnectOutcome {
        debug!(%host, %port, "Transport::connect_to: called");
        match TcpStream::connect((host, port)).await {
            Ok(stream) => ConnectOutcome::Connected(stream),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => ConnectOutcome::Refused,
            Err(e) => ConnectOutcome::Failed(e),
        }
    }

    /// Run the accept loop on `listener`
    pub fn serve(&self, listener: TcpListener) -> JoinHandle<()> {
        let addr = listener.local_addr().ok();
        debug!(?addr, "Transport::serve: called");
        *self
            .inner
            .listen_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = addr;
        let transport = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let peer = transport.attach(stream).await;
                        debug!(%peer, %addr, "Accepted connection");
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
        })
    }

    /// Address this transport accepts connections on; `None` until `serve`
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        *self
            .inner
            .listen_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connected stream and start its reader and writer
    pub async fn attach(&self, stream: TcpStream) -> PeerId {
        let peer = PeerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(%peer, "Transport::attach: called");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "Transport::attach: set_nodelay failed");
        }

        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        self.inner.peers().insert(peer, PeerEntry::new(outbound));

        self.inner.emit(TransportEvent::Connected { peer }).await;

        let writer = tokio::spawn(write_loop(self.inner.clone(), peer, write_half, outbound_rx));
        let reader = tokio::spawn(read_loop(self.inner.clone(), peer, read_half)).abort_handle();

        match self.inner.peers().get_mut(&peer) {
            Some(entry) => {
                entry.reader = Some(reader);
                entry.writer = Some(writer);
            }
            None => reader.abort(),
        }

        peer
    }

    /// Queue an envelope for `peer`
    ///
    /// Returns false when the peer is unknown or its writer is gone; the
    /// caller is never handed an error.
    pub fn send(&self, peer: PeerId, envelope: &Envelope) -> bool {
        let bytes = match envelope.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%peer, error = %e, "Failed to serialize envelope");
                return false;
            }
        };

        let peers = self.inner.peers();
        let Some(entry) = peers.get(&peer) else {
            warn!(%peer, command = %envelope.command, "Dropping send to unknown peer");
            return false;
        };

        if entry.outbound.send(bytes).is_err() {
            warn!(%peer, command = %envelope.command, "Dropping send to closed peer");
            return false;
        }

        debug!(%peer, command = %envelope.command, message_id = %envelope.message_id, "Transport::send: queued");
        true
    }

    /// Snapshot of a peer's metadata
    pub fn meta(&self, peer: PeerId) -> Option<PeerMeta> {
        self.inner.peers().get(&peer).map(|entry| entry.meta.clone())
    }

    /// Mutate a peer's metadata in place; false if the peer is gone
    pub fn update_meta(&self, peer: PeerId, f: impl FnOnce(&mut PeerMeta)) -> bool {
        match self.inner.peers().get_mut(&peer) {
            Some(entry) => {
                f(&mut entry.meta);
                true
            }
            None => false,
        }
    }

    /// Lowest-numbered peer whose metadata satisfies `pred`
    pub fn find_peer(&self, pred: impl Fn(&PeerMeta) -> bool) -> Option<PeerId> {
        self.inner
            .peers()
            .iter()
            .filter(|(_, entry)| pred(&entry.meta))
            .map(|(peer, _)| *peer)
            .min()
    }

    /// External-client peer that should receive a snippet
    ///
    /// With an explicit tab the peer whose active tab matches wins. Without
    /// one, the first tab client bound to no window or to `window_id`.
    pub fn find_tab_peer(&self, tab_id: Option<i64>, window_id: Option<&str>) -> Option<PeerId> {
        debug!(?tab_id, ?window_id, "Transport::find_tab_peer: called");
        match tab_id {
            Some(tab) => self.find_peer(|meta| meta.is_tab_client() && meta.active_tab_id == Some(tab)),
            None => self.find_peer(|meta| {
                meta.is_tab_client()
                    && match (&meta.window_id, window_id) {
                        (None, _) => true,
                        (Some(bound), Some(wanted)) => bound == wanted,
                        (Some(_), None) => false,
                    }
            }),
        }
    }

    pub fn is_open(&self, peer: PeerId) -> bool {
        self.inner.peers().contains_key(&peer)
    }

    /// Remove a peer without emitting `Closed`
    ///
    /// Frames already queued are flushed before the socket shuts.
    pub async fn close(&self, peer: PeerId) {
        debug!(%peer, "Transport::close: called");
        let removed = self.inner.peers().remove(&peer);
        if let Some(entry) = removed {
            entry.shutdown().await;
        }
    }

    pub async fn close_all(&self) {
        debug!("Transport::close_all: called");
        let drained: Vec<PeerEntry> = self.inner.peers().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            entry.shutdown().await;
        }
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers().len()
    }

    /// Register a socketless peer whose outbound frames land in a channel
    #[cfg(test)]
    pub(crate) fn attach_mailbox(&self) -> (PeerId, mpsc::UnboundedReceiver<Vec<u8>>) {
        let peer = PeerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, rx) = mpsc::unbounded_channel();
        self.inner.peers().insert(peer, PeerEntry::new(outbound));
        (peer, rx)
    }
}
