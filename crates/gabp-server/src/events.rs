//! Event channels: registry, subscriptions, sequencing and fan-out

use crate::connection::Connection;
use chrono::{DateTime, Utc};
use gabp_core::Message;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

struct ChannelState {
    description: Option<String>,
    /// Post-increment sequence; the first emitted event carries 1
    seq: Arc<AtomicU64>,
    subscribers: HashMap<String, Arc<Connection>>,
}

/// Registry of event channels and their subscribers.
///
/// One mutex covers the channel table and every subscriber set; it is
/// held only for structural mutation and snapshotting, never across
/// I/O. Sequence counters are per-channel atomics.
#[derive(Default)]
pub struct EventManager {
    channels: Mutex<HashMap<String, ChannelState>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. Re-registering overwrites the description
    /// but keeps the sequence counter and subscriber set.
    pub fn register(&self, name: &str, description: Option<&str>) {
        let mut channels = self.channels.lock().unwrap();
        match channels.get_mut(name) {
            Some(state) => {
                state.description = description.map(String::from);
            }
            None => {
                channels.insert(
                    name.to_string(),
                    ChannelState {
                        description: description.map(String::from),
                        seq: Arc::new(AtomicU64::new(0)),
                        subscribers: HashMap::new(),
                    },
                );
            }
        }
    }

    /// Remove a channel; returns whether it existed
    pub fn unregister(&self, name: &str) -> bool {
        self.channels.lock().unwrap().remove(name).is_some()
    }

    /// All channel names, sorted
    pub fn list(&self) -> Vec<String> {
        let channels = self.channels.lock().unwrap();
        let mut names: Vec<String> = channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has(&self, name: &str) -> bool {
        self.channels.lock().unwrap().contains_key(name)
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(name)
            .map(|state| state.subscribers.len())
            .unwrap_or(0)
    }

    /// Description of a channel, if registered with one
    pub fn description(&self, name: &str) -> Option<String> {
        self.channels
            .lock()
            .unwrap()
            .get(name)
            .and_then(|state| state.description.clone())
    }

    /// Add a connection to every named channel that exists.
    ///
    /// Returns the subset of names that exist; unknown names are
    /// silently dropped from the result.
    pub fn subscribe(&self, conn: &Arc<Connection>, names: &[String]) -> Vec<String> {
        let mut channels = self.channels.lock().unwrap();
        let mut subscribed = Vec::new();
        for name in names {
            if let Some(state) = channels.get_mut(name) {
                state
                    .subscribers
                    .insert(conn.id().to_string(), conn.clone());
                subscribed.push(name.clone());
            }
        }
        subscribed
    }

    /// Remove a connection from the named channels.
    ///
    /// Returns the subset it was actually removed from.
    pub fn unsubscribe(&self, connection_id: &str, names: &[String]) -> Vec<String> {
        let mut channels = self.channels.lock().unwrap();
        let mut unsubscribed = Vec::new();
        for name in names {
            if let Some(state) = channels.get_mut(name) {
                if state.subscribers.remove(connection_id).is_some() {
                    unsubscribed.push(name.clone());
                }
            }
        }
        unsubscribed
    }

    /// Remove a connection from every channel
    pub fn remove_connection(&self, connection_id: &str) {
        let mut channels = self.channels.lock().unwrap();
        for state in channels.values_mut() {
            state.subscribers.remove(connection_id);
        }
    }

    /// Emit an event on a channel.
    ///
    /// A no-op for unknown channels. The subscriber set is snapshotted
    /// under the lock, then fan-out sends run concurrently; the call
    /// resolves once every send has completed. Dead subscribers are
    /// evicted from all channels. Returns the assigned sequence
    /// number, or `None` when the channel is not registered.
    pub async fn emit(
        &self,
        channel: &str,
        payload: Value,
        timestamp: Option<DateTime<Utc>>,
    ) -> Option<u64> {
        let (seq, subscribers) = {
            let channels = self.channels.lock().unwrap();
            let state = match channels.get(channel) {
                Some(state) => state,
                None => {
                    debug!("Emit on unregistered channel {} dropped", channel);
                    return None;
                }
            };
            let seq = state.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let subscribers: Vec<Arc<Connection>> =
                state.subscribers.values().cloned().collect();
            (seq, subscribers)
        };

        let msg = Message::event(channel, seq, payload, timestamp);

        let mut sends = JoinSet::new();
        for conn in subscribers {
            let msg = msg.clone();
            sends.spawn(async move {
                if !conn.is_connected() {
                    return Some(conn);
                }
                match conn.send(&msg).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("Event send to {} failed: {}", conn.id(), e);
                        Some(conn)
                    }
                }
            });
        }

        let mut dead = Vec::new();
        while let Some(joined) = sends.join_next().await {
            if let Ok(Some(conn)) = joined {
                dead.push(conn);
            }
        }
        for conn in dead {
            self.remove_connection(conn.id());
        }

        Some(seq)
    }
}
