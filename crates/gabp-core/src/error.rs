//! Error types for GABP

use thiserror::Error;

/// Result type for GABP operations
pub type Result<T> = std::result::Result<T, GabpError>;

/// GABP error types
#[derive(Debug, Error)]
pub enum GabpError {
    /// Envelope parsed but does not match any known message shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authenticated request with an unknown method
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Missing or unusable required params
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Tool handler failure or server-side bug path
    #[error("Internal error: {0}")]
    Internal(String),

    /// `session/hello` with a missing or mismatched token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Non-handshake method before a successful handshake
    #[error("Session not established")]
    SessionNotEstablished,

    /// `tools/call` for a name not in the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Subscribe target does not exist (strict mode only)
    #[error("Event channel not found: {0}")]
    ChannelNotFound(String),

    /// Method valid but not allowed in the current session state
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Framing violation on the byte stream
    #[error("Frame error: {0}")]
    Frame(String),

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Socket-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server lifecycle misuse (start while running, etc.)
    #[error("Server state error: {0}")]
    ServerState(String),
}

impl From<serde_json::Error> for GabpError {
    fn from(err: serde_json::Error) -> Self {
        GabpError::Serialization(err.to_string())
    }
}

impl GabpError {
    /// Wire error code for this error
    pub fn code(&self) -> i32 {
        match self {
            GabpError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            GabpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            GabpError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            GabpError::Internal(_) => error_codes::INTERNAL_ERROR,
            GabpError::AuthenticationFailed(_) => error_codes::AUTHENTICATION_FAILED,
            GabpError::SessionNotEstablished => error_codes::SESSION_NOT_ESTABLISHED,
            GabpError::ToolNotFound(_) => error_codes::TOOL_NOT_FOUND,
            GabpError::ChannelNotFound(_) => error_codes::EVENT_CHANNEL_NOT_FOUND,
            GabpError::MethodNotAllowed(_) => error_codes::METHOD_NOT_ALLOWED,
            GabpError::Frame(_)
            | GabpError::Serialization(_)
            | GabpError::Transport(_)
            | GabpError::ServerState(_) => error_codes::SERVER_ERROR,
        }
    }
}

/// Wire error codes for GABP responses
pub mod error_codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const SERVER_ERROR: i32 = -32000;
    pub const AUTHENTICATION_FAILED: i32 = -31000;
    pub const SESSION_NOT_ESTABLISHED: i32 = -31001;
    pub const TOOL_NOT_FOUND: i32 = -31002;
    pub const EVENT_CHANNEL_NOT_FOUND: i32 = -31003;
    pub const RESOURCE_NOT_FOUND: i32 = -31004;
    pub const METHOD_NOT_ALLOWED: i32 = -31005;
}
