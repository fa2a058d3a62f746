//! Per-connection session state machine and request routing
//!
//! Before authentication only `session/hello` is considered; every
//! other method is answered with `SessionNotEstablished`. After the
//! handshake, requests are routed by method to the tool registry or
//! the event manager.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::events::EventManager;
use crate::tools::ToolRegistry;
use gabp_core::{
    AppInfo, CapabilitySet, ErrorObject, GabpError, HelloParams, Message, Platform, Welcome,
    PROTOCOL_VERSION, SCHEMA_VERSION,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Auth state and negotiated handshake fields for one connection
pub struct Session {
    connection_id: String,
    authenticated: bool,
    bridge_version: Option<String>,
    platform: Option<Platform>,
    launch_id: Option<String>,
}

impl Session {
    pub fn new(connection_id: &str) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            authenticated: false,
            bridge_version: None,
            platform: None,
            launch_id: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn bridge_version(&self) -> Option<&str> {
        self.bridge_version.as_deref()
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn launch_id(&self) -> Option<&str> {
        self.launch_id.as_deref()
    }
}

/// Shared handles the router needs to serve a request
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<ServerConfig>,
    pub tools: Arc<ToolRegistry>,
    pub events: Arc<EventManager>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChannelListParams {
    channels: Vec<String>,
}

/// Route one incoming message for a connection.
///
/// Returns at most one response per request; client-originated
/// responses and events are ignored.
pub async fn dispatch(
    ctx: &SessionContext,
    conn: &Arc<Connection>,
    session: &mut Session,
    msg: Message,
) -> Option<Message> {
    let (v, id, method, params) = match msg {
        Message::Request {
            v,
            id,
            method,
            params,
        } => (v, id, method, params),
        other => {
            debug!(
                "Ignoring client-originated {} frame on {}",
                match other {
                    Message::Response { .. } => "response",
                    _ => "event",
                },
                session.connection_id
            );
            return None;
        }
    };

    if v != PROTOCOL_VERSION {
        return Some(Message::response_err(
            &id,
            ErrorObject::from(&GabpError::InvalidRequest(format!(
                "Unsupported protocol version: {}",
                v
            ))),
        ));
    }

    if !session.authenticated {
        if method == "session/hello" {
            return Some(handle_hello(ctx, session, &id, params));
        }
        return Some(Message::response_err(
            &id,
            ErrorObject::from(&GabpError::SessionNotEstablished),
        ));
    }

    let outcome = match method.as_str() {
        "session/hello" => Err(GabpError::MethodNotAllowed(
            "Session already established".into(),
        )),
        "tools/list" => Ok(serde_json::json!({ "tools": ctx.tools.list() })),
        "tools/call" => handle_tool_call(ctx, params).await,
        "events/subscribe" => handle_subscribe(ctx, conn, params),
        "events/unsubscribe" => handle_unsubscribe(ctx, conn, params),
        _ => Err(GabpError::MethodNotFound(method.clone())),
    };

    Some(match outcome {
        Ok(result) => Message::response_ok(&id, result),
        Err(e) => Message::response_err(&id, ErrorObject::from(&e)),
    })
}

/// `session/hello`: token check, then store the negotiated fields and
/// return the welcome with the capability set.
fn handle_hello(
    ctx: &SessionContext,
    session: &mut Session,
    request_id: &str,
    params: Value,
) -> Message {
    // Token first: a missing or mismatched token is an auth failure
    // even when the rest of the params are unusable.
    let token = params.get("token").and_then(Value::as_str);
    if token != Some(ctx.config.token.as_str()) {
        return Message::response_err(
            request_id,
            ErrorObject::from(&GabpError::AuthenticationFailed(
                "Token missing or mismatched".into(),
            )),
        );
    }

    let hello: HelloParams = match serde_json::from_value(params) {
        Ok(hello) => hello,
        Err(e) => {
            return Message::response_err(
                request_id,
                ErrorObject::from(&GabpError::InvalidParams(format!(
                    "Invalid handshake params: {}",
                    e
                ))),
            );
        }
    };

    session.authenticated = true;
    session.bridge_version = Some(hello.bridge_version);
    session.platform = Some(hello.platform);
    session.launch_id = Some(hello.launch_id);
    info!(
        "Session established on {} (bridge {} on {:?})",
        session.connection_id,
        session.bridge_version.as_deref().unwrap_or("?"),
        hello.platform
    );

    let welcome = Welcome {
        agent_id: ctx.config.agent_id.clone(),
        app: AppInfo {
            name: ctx.config.app_name.clone(),
            version: ctx.config.app_version.clone(),
        },
        capabilities: CapabilitySet {
            tools: ctx.tools.names(),
            events: ctx.events.list(),
            resources: Vec::new(),
        },
        schema_version: SCHEMA_VERSION.to_string(),
    };

    match serde_json::to_value(welcome) {
        Ok(result) => Message::response_ok(request_id, result),
        Err(e) => Message::response_err(
            request_id,
            ErrorObject::from(&GabpError::Internal(e.to_string())),
        ),
    }
}

async fn handle_tool_call(ctx: &SessionContext, params: Value) -> Result<Value, GabpError> {
    let call: ToolCallParams = serde_json::from_value(params)
        .map_err(|e| GabpError::InvalidParams(format!("Invalid tools/call params: {}", e)))?;
    if call.name.trim().is_empty() {
        return Err(GabpError::InvalidParams("Tool name is required".into()));
    }
    ctx.tools.call(&call.name, call.arguments).await
}

fn handle_subscribe(
    ctx: &SessionContext,
    conn: &Arc<Connection>,
    params: Value,
) -> Result<Value, GabpError> {
    let list: ChannelListParams = serde_json::from_value(params)
        .map_err(|e| GabpError::InvalidParams(format!("Invalid subscribe params: {}", e)))?;
    let subscribed = ctx.events.subscribe(conn, &list.channels);
    Ok(serde_json::json!({ "subscribed": subscribed }))
}

fn handle_unsubscribe(
    ctx: &SessionContext,
    conn: &Arc<Connection>,
    params: Value,
) -> Result<Value, GabpError> {
    let list: ChannelListParams = serde_json::from_value(params)
        .map_err(|e| GabpError::InvalidParams(format!("Invalid unsubscribe params: {}", e)))?;
    let unsubscribed = ctx.events.unsubscribe(conn.id(), &list.channels);
    Ok(serde_json::json!({ "unsubscribed": unsubscribed }))
}
