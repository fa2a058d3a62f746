//! Server configuration

use uuid::Uuid;

/// Configuration for a GABP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port on loopback; 0 picks an ephemeral port
    pub port: u16,
    /// Shared secret the bridge must present in `session/hello`
    pub token: String,
    /// Agent id reported in the handshake welcome
    pub agent_id: String,
    /// Embedding application name
    pub app_name: String,
    /// Embedding application version
    pub app_version: String,
    /// Launch id recorded in the bridge config artifact
    pub launch_id: String,
    /// Write `bridge.json` under the platform config dir at start
    pub write_bridge_config: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            token: Uuid::new_v4().to_string(),
            agent_id: "gabp".to_string(),
            app_name: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            launch_id: Uuid::new_v4().to_string(),
            write_bridge_config: false,
        }
    }
}

impl ServerConfig {
    /// Build a config honoring the externally-supplied environment:
    /// `GABS_GAME_ID` (agent id), `GABP_SERVER_PORT`, `GABP_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(game_id) = std::env::var("GABS_GAME_ID") {
            if !game_id.is_empty() {
                config.agent_id = game_id;
            }
        }
        if let Ok(port) = std::env::var("GABP_SERVER_PORT") {
            if let Ok(port) = port.trim().parse::<u16>() {
                config.port = port;
            }
        }
        if let Ok(token) = std::env::var("GABP_TOKEN") {
            if !token.is_empty() {
                config.token = token;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 0);
        assert!(!config.token.is_empty());
        assert!(!config.write_bridge_config);
    }

    #[test]
    fn test_distinct_tokens() {
        assert_ne!(ServerConfig::default().token, ServerConfig::default().token);
    }
}
