//! Test helpers for integration tests
//!
//! Wires a [`GatewayClient`] to a fresh mock REST server and mock gateway.

use crate::gateway::{GatewayConn, MockGateway, STEP_TIMEOUT};
use crate::rest::MockRest;
use anyhow::{anyhow, bail, Result};
use chatlink_common::ClientConfig;
use chatlink_gateway::{EventRegistry, GatewayClient, GatewayResult, OpCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

pub const TEST_TOKEN: &str = "test-token";

/// Heartbeat interval long enough that no beat fires during a test
pub const QUIET_HEARTBEAT_MS: u64 = 45_000;

/// Client configuration pointing at the mock REST server, with short delays
pub fn test_config(rest: &MockRest) -> ClientConfig {
    ClientConfig::new(TEST_TOKEN)
        .with_api_base(rest.api_base())
        .with_reconnect_delay_ms(50)
        .with_invalid_session_delay_ms(10, 30)
}

/// READY payload resuming against `resume_url`
pub fn ready_payload(session_id: &str, resume_url: &str) -> Value {
    json!({
        "v": 10,
        "session_id": session_id,
        "resume_gateway_url": resume_url,
        "user": {"id": "1", "username": "chatlink", "bot": true},
        "guilds": [],
        "shard": [0, 1]
    })
}

/// Poll `check` until it holds or the step timeout passes
pub async fn eventually(what: &str, check: impl Fn() -> bool) -> Result<()> {
    let deadline = Instant::now() + STEP_TIMEOUT;
    while !check() {
        if Instant::now() >= deadline {
            bail!("timed out waiting for {what}");
        }
        sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// A running client with its mock servers
pub struct Harness {
    pub rest: MockRest,
    pub gateway: MockGateway,
    pub client: Arc<GatewayClient>,
    run: JoinHandle<GatewayResult<()>>,
}

impl Harness {
    pub async fn start(registry: EventRegistry) -> Result<Self> {
        Self::start_with(registry, |config| config).await
    }

    /// Start with a tweaked client configuration
    pub async fn start_with(
        registry: EventRegistry,
        configure: impl FnOnce(ClientConfig) -> ClientConfig,
    ) -> Result<Self> {
        let gateway = MockGateway::start().await?;
        let rest = MockRest::start(gateway.url()).await?;
        let client = Arc::new(GatewayClient::new(configure(test_config(&rest)), registry)?);

        let run = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.run().await })
        };

        Ok(Self {
            rest,
            gateway,
            client,
            run,
        })
    }

    /// Accept a connection, identify, and send READY with sequence 1
    pub async fn connect_ready(&mut self, session_id: &str) -> Result<GatewayConn> {
        let mut conn = self.gateway.accept().await?;
        conn.hello(QUIET_HEARTBEAT_MS).await?;
        conn.expect(OpCode::Identify).await?;
        conn.dispatch("READY", 1, ready_payload(session_id, &self.gateway.url()))
            .await?;

        let client = Arc::clone(&self.client);
        eventually("READY to be processed", move || client.state().session_id.is_some()).await?;
        Ok(conn)
    }

    /// Wait for `run` to return without asking it to
    pub async fn finished(self) -> Result<GatewayResult<()>> {
        tokio::time::timeout(STEP_TIMEOUT, self.run)
            .await
            .map_err(|_| anyhow!("client did not stop"))?
            .map_err(Into::into)
    }

    /// Shut the client down and wait for `run` to return
    pub async fn stop(self) -> Result<GatewayResult<()>> {
        self.client.shutdown_handle().shutdown();
        self.finished().await
    }
}
