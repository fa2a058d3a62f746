//! GABP demo host
//!
//! Starts a server with a couple of illustrative tools and a
//! heartbeat on `system/status`, then runs until Ctrl-C. Port, token
//! and agent id come from GABP_SERVER_PORT / GABP_TOKEN /
//! GABS_GAME_ID when set.

use anyhow::Result;
use chrono::Utc;
use gabp_core::{ToolDescriptor, ToolParameter};
use gabp_server::{GabpServer, ServerConfig};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ServerConfig::from_env();
    config.write_bridge_config = true;
    let server = GabpServer::new(config);

    server.tools().register_fn(
        "session/echo",
        Some(
            ToolDescriptor::named("session/echo")
                .with_description("Echo the arguments back unchanged"),
        ),
        |args| async move { Ok(args) },
    )?;

    server.tools().register_typed(
        ToolDescriptor::named("math/add")
            .with_description("Add two integers")
            .with_parameters(vec![
                ToolParameter::required("a", "integer"),
                ToolParameter::optional("b", "integer", json!(0)),
            ]),
        |p: AddParams| async move { Ok(p.a + p.b) },
    )?;

    let port = server.start().await?;
    info!(
        "GABP server ready on 127.0.0.1:{} (agent {})",
        port,
        server.config().agent_id
    );

    // Heartbeat for subscribed bridges
    let events = server.events().clone();
    let heartbeat = tokio::spawn(async move {
        let mut tick = 0u64;
        loop {
            sleep(Duration::from_secs(5)).await;
            tick += 1;
            events
                .emit("system/status", json!({ "tick": tick }), Some(Utc::now()))
                .await;
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    heartbeat.abort();
    server.stop().await;
    Ok(())
}
