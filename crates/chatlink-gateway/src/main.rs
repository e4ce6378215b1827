//! Demo bot entry point
//!
//! Run with:
//! ```bash
//! CHATLINK_TOKEN=... cargo run -p chatlink-gateway
//! ```
//!
//! Answers `!ping` with the current heartbeat latency. Configuration is
//! loaded from environment variables (and `.env`).

use anyhow::Context as _;
use chatlink_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use chatlink_core::{EventType, Intents, Snowflake};
use chatlink_gateway::dispatch::{content_starts_with, id_at};
use chatlink_gateway::protocol::{Activity, PresenceUpdatePayload, Status};
use chatlink_gateway::{
    handler_fn, Context, GatewayClient, HandlerError, HandlerResult, Propagation, Registration,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %format_args!("{e:#}"), "Bot stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(env = ?config.env, shard = ?config.shard, "Configuration loaded");

    let mut registry = chatlink_gateway::EventRegistry::new();
    registry
        .register(
            Registration::new(EventType::Ready, handler_fn(on_ready))
                .label("ready")
                .priority(0),
        )
        .register(
            Registration::new(EventType::MessageCreate, handler_fn(on_ping))
                .shared_predicate(content_starts_with("!ping"))
                .label("ping"),
        );

    let presence = PresenceUpdatePayload::new(Status::Online).with_activity(Activity::watching("for !ping"));
    let client = Arc::new(
        GatewayClient::new(config.with_intents(Intents::MESSAGE_CONTENT), registry)?.with_presence(presence),
    );

    let shutdown = client.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            shutdown.shutdown();
        }
    });

    client.run().await?;
    Ok(())
}

async fn on_ready(_ctx: Context, data: Arc<Value>) -> HandlerResult<Propagation> {
    let user = data
        .pointer("/user/username")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!(user, "Logged in");
    Ok(Propagation::Continue)
}

async fn on_ping(ctx: Context, data: Arc<Value>) -> HandlerResult<Propagation> {
    let channel_id: Snowflake =
        id_at(&data, "/channel_id").ok_or_else(|| HandlerError::bad_request("message without channel_id"))?;

    let latency = ctx
        .latency()
        .map_or_else(|| "unknown".to_string(), |l| format!("{}ms", l.as_millis()));
    ctx.http()
        .create_message(channel_id, json!({ "content": format!("Pong! ({latency})") }))
        .await?;

    Ok(Propagation::Stop)
}
