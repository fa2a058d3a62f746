//! Handshake and capability types for `session/hello`

use serde::{Deserialize, Serialize};

/// Bridge host platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
}

/// Params of a `session/hello` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloParams {
    pub token: String,
    pub bridge_version: String,
    pub platform: Platform,
    pub launch_id: String,
}

/// Welcome result returned on a successful handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub agent_id: String,
    pub app: AppInfo,
    pub capabilities: CapabilitySet,
    pub schema_version: String,
}

/// Embedding application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

/// Advertised tool, event channel and resource names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub tools: Vec<String>,
    pub events: Vec<String>,
    pub resources: Vec<String>,
}
