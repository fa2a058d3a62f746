//! Bridge config artifact
//!
//! A JSON file the bridge process reads to discover the port and
//! token. Written exactly once at start when enabled, under the
//! platform config dir: `%APPDATA%/gabp/bridge.json` on Windows,
//! `~/Library/Application Support/gabp/bridge.json` on macOS,
//! `~/.config/gabp/bridge.json` on Linux.

use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use gabp_core::{GabpError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Contents of `bridge.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeFile {
    pub token: String,
    pub transport: BridgeTransport,
    pub metadata: BridgeMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTransport {
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMetadata {
    pub pid: u32,
    pub start_time: DateTime<Utc>,
    pub launch_id: String,
}

/// Platform-specific location of `bridge.json`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gabp").join("bridge.json"))
}

/// Write the artifact for a server listening on `port`
pub fn write(config: &ServerConfig, port: u16) -> Result<PathBuf> {
    let path = default_path()
        .ok_or_else(|| GabpError::Internal("No config directory on this platform".into()))?;
    write_to(&path, config, port)?;
    Ok(path)
}

/// Write the artifact to an explicit path
pub fn write_to(path: &Path, config: &ServerConfig, port: u16) -> Result<()> {
    let doc = BridgeFile {
        token: config.token.clone(),
        transport: BridgeTransport {
            kind: "tcp".to_string(),
            address: port.to_string(),
        },
        metadata: BridgeMetadata {
            pid: std::process::id(),
            start_time: Utc::now(),
            launch_id: config.launch_id.clone(),
        },
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            GabpError::Internal(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let bytes = serde_json::to_vec_pretty(&doc)?;
    std::fs::write(path, bytes)
        .map_err(|e| GabpError::Internal(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Bridge config written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_write_and_read_back() {
        let dir = std::env::temp_dir().join(format!("gabp-test-{}", Uuid::new_v4()));
        let path = dir.join("bridge.json");
        let config = ServerConfig {
            token: "T".into(),
            launch_id: "L1".into(),
            ..ServerConfig::default()
        };

        write_to(&path, &config, 4242).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let doc: BridgeFile = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc.token, "T");
        assert_eq!(doc.transport.kind, "tcp");
        assert_eq!(doc.transport.address, "4242");
        assert_eq!(doc.metadata.launch_id, "L1");
        assert_eq!(doc.metadata.pid, std::process::id());

        // wire key names
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"type\": \"tcp\""));
        assert!(text.contains("\"startTime\""));
        assert!(text.contains("\"launchId\""));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
