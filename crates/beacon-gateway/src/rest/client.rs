//! HTTP client for the REST endpoints the gateway session needs

use super::{InteractionResponse, RestError, RestResult};
use async_trait::async_trait;
use beacon_common::DiscordConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Timeout applied to every REST request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayBotResponse {
    /// WebSocket URL to connect to
    pub url: String,

    /// Recommended shard count
    #[serde(default)]
    pub shards: u32,

    #[serde(default)]
    pub session_start_limit: Option<SessionStartLimit>,
}

/// Identify budget of the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until the budget resets
    pub reset_after: u64,
    pub max_concurrency: u32,
}

/// Sends interaction callbacks
///
/// Seam between command handlers and the HTTP transport.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    /// Answer an interaction
    async fn create_interaction_response(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> RestResult<()>;
}

/// REST client
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    token: String,
}

impl RestClient {
    /// Create a client for the configured API base URL
    pub fn new(config: &DiscordConfig) -> RestResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// API base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Resolve the gateway URL for this bot
    pub async fn get_gateway_bot(&self) -> RestResult<GatewayBotResponse> {
        let response = self
            .http
            .get(self.url("/gateway/bot"))
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_for(status, response).await);
        }

        let body = response.bytes().await?;
        let gateway: GatewayBotResponse = serde_json::from_slice(&body)?;

        tracing::debug!(
            url = %gateway.url,
            shards = gateway.shards,
            remaining = gateway.session_start_limit.as_ref().map(|l| l.remaining),
            "Resolved gateway URL"
        );

        Ok(gateway)
    }
}

#[async_trait]
impl InteractionResponder for RestClient {
    async fn create_interaction_response(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> RestResult<()> {
        let url = self.url(&format!("/interactions/{interaction_id}/{token}/callback"));
        let reply = self.http.post(url).json(response).send().await?;

        let status = reply.status();
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            return Err(error_for(status, reply).await);
        }

        tracing::debug!(interaction_id, status = status.as_u16(), "Interaction callback sent");
        Ok(())
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

async fn error_for(status: StatusCode, response: Response) -> RestError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return RestError::Unauthorized(status);
    }
    let body = response.text().await.unwrap_or_default();
    RestError::UnexpectedStatus { status, body }
}
