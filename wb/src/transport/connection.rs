//! Per-connection reader and writer tasks

use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::core::Inner;
use super::peer::{PeerId, TransportEvent};
use crate::protocol::{read_frame, write_frame};

/// Read frames until EOF or error, then remove the peer
pub(super) async fn read_loop(inner: Arc<Inner>, peer: PeerId, mut reader: OwnedReadHalf) {
    debug!(%peer, "read_loop: started");
    let error = loop {
        match read_frame(&mut reader, inner.max_frame_bytes).await {
            Ok(Some(frame)) => {
                if !inner.emit(TransportEvent::Message { peer, frame }).await {
                    debug!(%peer, "read_loop: event channel closed");
                    return;
                }
            }
            Ok(None) => break None,
            Err(e) => {
                warn!(%peer, error = %e, "Read failed, closing peer");
                break Some(e.to_string());
            }
        }
    };

    inner.drop_peer(peer, error, false).await;
}

/// Drain the outbound queue onto the socket
///
/// Ends when the peer's entry is removed (its sender dropped) or a write fails.
pub(super) async fn write_loop(
    inner: Arc<Inner>,
    peer: PeerId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    debug!(%peer, "write_loop: started");
    while let Some(body) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &body).await {
            warn!(%peer, error = %e, "Write failed, closing peer");
            inner.drop_peer(peer, Some(e.to_string()), true).await;
            return;
        }
    }
    debug!(%peer, "write_loop: outbound closed");
}
