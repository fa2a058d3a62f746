//! Per-connection state and the serialized write path

use gabp_core::{codec, GabpError, Message, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// One accepted bridge connection.
///
/// The writer half lives behind a mutex so concurrent senders never
/// interleave one frame's bytes with another's.
pub struct Connection {
    id: String,
    peer: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    connected: AtomicBool,
}

impl Connection {
    pub(crate) fn new(peer: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            peer,
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
        }
    }

    /// Server-assigned connection id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote address of the bridge
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Encode and send one message, holding the writer for the whole frame
    pub async fn send(&self, msg: &Message) -> Result<()> {
        if !self.is_connected() {
            return Err(GabpError::Transport("Connection closed".into()));
        }

        let frame = codec::encode(msg)?;
        let mut writer = self.writer.lock().await;
        let written = async {
            writer
                .write_all(&frame)
                .await
                .map_err(|e| GabpError::Transport(format!("Write failed: {}", e)))?;
            writer
                .flush()
                .await
                .map_err(|e| GabpError::Transport(format!("Flush failed: {}", e)))
        }
        .await;

        if written.is_err() {
            self.mark_disconnected();
        }
        written
    }

    /// Mark disconnected and shut down the write half
    pub(crate) async fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!("Shutdown of {} returned: {}", self.id, e);
            }
        }
    }
}
