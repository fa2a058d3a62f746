//! Loopback TCP transport: accept loop and per-connection read loops

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::events::EventManager;
use crate::session::{self, Session, SessionContext};
use crate::tools::ToolRegistry;
use gabp_core::FrameDecoder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const READ_BUF_LEN: usize = 8 * 1024;
const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Handles shared between the accept loop and every read loop
pub(crate) struct Shared {
    pub config: Arc<ServerConfig>,
    pub tools: Arc<ToolRegistry>,
    pub events: Arc<EventManager>,
    pub connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,
}

impl Shared {
    fn session_context(&self) -> SessionContext {
        SessionContext {
            config: self.config.clone(),
            tools: self.tools.clone(),
            events: self.events.clone(),
        }
    }
}

/// Accept connections until the shutdown signal fires.
///
/// Accept errors other than listener teardown back off before the
/// next attempt.
pub(crate) async fn accept_loop(
    shared: Arc<Shared>,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("Accept loop shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    spawn_connection(&shared, stream, peer, shutdown.resubscribe());
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}

fn spawn_connection(
    shared: &Arc<Shared>,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: broadcast::Receiver<()>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("set_nodelay failed for {}: {}", peer, e);
    }

    let (read_half, write_half) = stream.into_split();
    let conn = Arc::new(Connection::new(peer, write_half));
    shared
        .connections
        .write()
        .unwrap()
        .insert(conn.id().to_string(), conn.clone());
    info!("Connection established: {} from {}", conn.id(), peer);

    let shared = shared.clone();
    tokio::spawn(read_loop(shared, conn, read_half, shutdown));
}

/// Read frames for one connection and dispatch them in receive order.
///
/// A slow handler intentionally blocks later messages on the same
/// connection; cross-connection ordering is unspecified. EOF, an I/O
/// error or a framing violation ends the loop and runs the disconnect
/// cleanup exactly once.
async fn read_loop(
    shared: Arc<Shared>,
    conn: Arc<Connection>,
    mut read_half: OwnedReadHalf,
    mut shutdown: broadcast::Receiver<()>,
) {
    let ctx = shared.session_context();
    let mut session = Session::new(conn.id());
    let mut decoder = FrameDecoder::new();
    let mut scratch = [0u8; READ_BUF_LEN];

    'outer: loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("Read loop for {} shutting down", conn.id());
                break;
            }
            read = read_half.read(&mut scratch) => {
                match read {
                    Ok(0) => {
                        debug!("Connection {} closed by peer", conn.id());
                        break;
                    }
                    Ok(n) => {
                        decoder.extend(&scratch[..n]);
                        loop {
                            match decoder.next_message() {
                                Ok(Some(msg)) => {
                                    if let Some(reply) =
                                        session::dispatch(&ctx, &conn, &mut session, msg).await
                                    {
                                        if let Err(e) = conn.send(&reply).await {
                                            warn!("Reply to {} failed: {}", conn.id(), e);
                                            break 'outer;
                                        }
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    warn!("Framing error on {}: {}", conn.id(), e);
                                    break 'outer;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Read failed on {}: {}", conn.id(), e);
                        break;
                    }
                }
            }
        }
    }

    teardown(&shared, &conn).await;
}

/// Disconnect cleanup: transport first, then the connection table,
/// then the event manager.
async fn teardown(shared: &Arc<Shared>, conn: &Arc<Connection>) {
    conn.close().await;
    shared.connections.write().unwrap().remove(conn.id());
    shared.events.remove_connection(conn.id());
    info!("Connection closed: {}", conn.id());
}
