//! # gabp-server
//!
//! Embeddable server for the Game Agent Bridge Protocol (GABP).
//!
//! A game or host application embeds [`GabpServer`] to expose tools
//! (callable operations) and event channels (push streams) to an
//! external bridge process over a token-authenticated loopback TCP
//! socket. This crate provides:
//! - Loopback TCP transport with per-connection read/write loops
//! - The session state machine and request routing
//! - The tool registry with typed argument binding
//! - The event manager with per-channel sequence counters

pub mod bridge_file;
pub mod config;
pub mod connection;
pub mod events;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::ServerConfig;
pub use connection::Connection;
pub use events::EventManager;
pub use session::{Session, SessionContext};
pub use tools::{bind_arguments, ToolHandler, ToolRegistry};

use chrono::{DateTime, Utc};
use gabp_core::{GabpError, Result, ToolDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

enum RunState {
    Created,
    Running { accept_task: JoinHandle<()> },
    Stopped,
}

/// GABP server facade.
///
/// Wires the tool registry, event manager and transport together.
/// Lifecycle is `CREATED -> RUNNING -> STOPPED`: `start` is rejected
/// when not freshly created, `stop` is idempotent.
pub struct GabpServer {
    config: Arc<ServerConfig>,
    tools: Arc<ToolRegistry>,
    events: Arc<EventManager>,
    connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,
    shutdown_tx: broadcast::Sender<()>,
    state: Mutex<RunState>,
    /// Assigned listen port; 0 until `start` binds
    port: AtomicU16,
}

impl GabpServer {
    /// Create a server; registers the built-in `system/*` channels
    pub fn new(config: ServerConfig) -> Self {
        let events = Arc::new(EventManager::new());
        events.register("system/status", Some("System status events"));
        events.register("system/log", Some("System log events"));

        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            tools: Arc::new(ToolRegistry::new()),
            events,
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
            state: Mutex::new(RunState::Created),
            port: AtomicU16::new(0),
        }
    }

    /// Bind the loopback listener and spawn the accept loop.
    ///
    /// Returns the assigned port. When enabled in the config, the
    /// bridge config artifact is written once here.
    pub async fn start(&self) -> Result<u16> {
        let mut state = self.state.lock().await;
        match *state {
            RunState::Created => {}
            RunState::Running { .. } => {
                return Err(GabpError::ServerState("Server already running".into()))
            }
            RunState::Stopped => {
                return Err(GabpError::ServerState("Server already stopped".into()))
            }
        }

        let listener = TcpListener::bind(("127.0.0.1", self.config.port))
            .await
            .map_err(|e| GabpError::Transport(format!("Bind failed: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| GabpError::Transport(format!("No local address: {}", e)))?
            .port();
        self.port.store(port, Ordering::SeqCst);

        if self.config.write_bridge_config {
            if let Err(e) = bridge_file::write(&self.config, port) {
                warn!("Bridge config not written: {}", e);
            }
        }

        let shared = Arc::new(transport::Shared {
            config: self.config.clone(),
            tools: self.tools.clone(),
            events: self.events.clone(),
            connections: self.connections.clone(),
        });
        let accept_task = tokio::spawn(transport::accept_loop(
            shared,
            listener,
            self.shutdown_tx.subscribe(),
        ));

        *state = RunState::Running { accept_task };
        info!("GABP server listening on 127.0.0.1:{}", port);
        Ok(port)
    }

    /// Stop the listener and close every connection. Idempotent.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, RunState::Stopped);
        let RunState::Running { accept_task } = previous else {
            return;
        };

        let _ = self.shutdown_tx.send(());

        let connections: Vec<Arc<Connection>> = {
            let table = self.connections.read().unwrap();
            table.values().cloned().collect()
        };
        for conn in connections {
            conn.close().await;
        }

        if let Err(e) = accept_task.await {
            warn!("Accept task ended abnormally: {}", e);
        }
        info!("GABP server stopped");
    }

    /// Assigned listen port, once running
    pub fn port(&self) -> Option<u16> {
        match self.port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port),
        }
    }

    /// Shared secret the bridge must present
    pub fn token(&self) -> &str {
        &self.config.token
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// Currently connected bridge count
    pub fn connection_count(&self) -> usize {
        self.connections.read().unwrap().len()
    }

    /// Register a tool (see [`ToolRegistry::register`])
    pub fn register_tool(
        &self,
        name: &str,
        handler: Arc<dyn ToolHandler>,
        descriptor: Option<ToolDescriptor>,
    ) -> Result<()> {
        self.tools.register(name, handler, descriptor)
    }

    /// Register an event channel
    pub fn register_channel(&self, name: &str, description: Option<&str>) {
        self.events.register(name, description);
    }

    /// Remove an event channel
    pub fn unregister_channel(&self, name: &str) -> bool {
        self.events.unregister(name)
    }

    /// Emit an event (see [`EventManager::emit`])
    pub async fn emit(
        &self,
        channel: &str,
        payload: Value,
        timestamp: Option<DateTime<Utc>>,
    ) -> Option<u64> {
        self.events.emit(channel, payload, timestamp).await
    }
}
