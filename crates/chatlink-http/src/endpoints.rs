//! Endpoint wrappers
//!
//! A small set of typed helpers over [`Route`]. Anything not covered here can
//! be sent with [`HttpClient::request`] and a hand-built route.

use crate::client::HttpClient;
use crate::error::HttpResult;
use crate::request::FileAttachment;
use crate::route::Route;
use chatlink_core::Snowflake;
use serde::Deserialize;
use serde_json::Value;

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub session_start_limit: Option<SessionStartLimit>,
}

/// Identify budget reported alongside the gateway URL
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_shards() -> u32 {
    1
}

fn default_max_concurrency() -> u32 {
    1
}

impl HttpClient {
    // ========================================================================
    // Gateway
    // ========================================================================

    /// Gateway URL and recommended shard count
    pub async fn get_gateway_bot(&self) -> HttpResult<GatewayBot> {
        self.request_json(Route::get("/gateway/bot").into_request()?).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn get_current_user(&self) -> HttpResult<Value> {
        self.request_json(Route::get("/users/@me").into_request()?).await
    }

    // ========================================================================
    // Channels
    // ========================================================================

    pub async fn get_channel(&self, channel_id: Snowflake) -> HttpResult<Value> {
        let route = Route::get("/channels/{channel_id}").channel_id(channel_id);
        self.request_json(route.into_request()?).await
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Post a message; `body` is the message create payload
    pub async fn create_message(&self, channel_id: Snowflake, body: Value) -> HttpResult<Value> {
        let route = Route::post("/channels/{channel_id}/messages").channel_id(channel_id);
        self.request_json(route.into_request()?.json(body)).await
    }

    /// Post a message with file attachments
    pub async fn create_message_with_files(
        &self,
        channel_id: Snowflake,
        body: Value,
        files: Vec<FileAttachment>,
    ) -> HttpResult<Value> {
        let route = Route::post("/channels/{channel_id}/messages").channel_id(channel_id);
        let request = files
            .into_iter()
            .fold(route.into_request()?.json(body), |request, file| request.file(file));
        self.request_json(request).await
    }

    pub async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        reason: Option<&str>,
    ) -> HttpResult<()> {
        let route = Route::delete("/channels/{channel_id}/messages/{message_id}")
            .channel_id(channel_id)
            .param("message_id", message_id);
        let mut request = route.into_request()?;
        if let Some(reason) = reason {
            request = request.reason(reason);
        }
        self.request(request).await.map(|_| ())
    }

    // ========================================================================
    // Reactions
    // ========================================================================

    /// React as the current user; `emoji` is a unicode emoji or `name:id`
    pub async fn create_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> HttpResult<()> {
        let route = Route::put("/channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me")
            .channel_id(channel_id)
            .param("message_id", message_id)
            .param("emoji", emoji);
        self.request(route.into_request()?).await.map(|_| ())
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Execute a webhook and wait for the created message
    pub async fn execute_webhook(
        &self,
        webhook_id: Snowflake,
        token: &str,
        body: Value,
    ) -> HttpResult<Option<Value>> {
        let route = Route::post("/webhooks/{webhook_id}/{webhook_token}")
            .webhook_id(webhook_id)
            .webhook_token(token);
        self.request(route.into_request()?.query("wait", true).json(body))
            .await
    }
}
