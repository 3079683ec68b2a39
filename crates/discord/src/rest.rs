//! REST delivery path: open a direct channel to the recipient, then post
//! each digest chunk into it.

use {
    async_trait::async_trait,
    reqwest::header::AUTHORIZATION,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::json,
    tracing::{debug, info, warn},
};

use recap_schedule::DeliverySink;

use crate::{Error, Result};

/// Default REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// How much of an error response body is kept in the error message.
const ERROR_BODY_SNIPPET: usize = 200;

/// Thin REST client for the two calls the digest path needs.
pub struct RestClient {
    http: reqwest::Client,
    token: Secret<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

impl RestClient {
    pub fn new(token: Secret<String>) -> Self {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Point the client at a different API root, for tests.
    pub fn with_base_url(token: Secret<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url: base_url.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    /// Open (or re-open) the direct channel to a recipient. Returns the
    /// channel id.
    pub async fn create_dm(&self, recipient_id: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/users/@me/channels", self.base_url))
            .header(AUTHORIZATION, self.auth_header())
            .json(&json!({ "recipient_id": recipient_id }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let channel: DmChannel = response.json().await?;
        debug!(channel_id = %channel.id, "direct channel opened");
        Ok(channel.id)
    }

    /// Post one message into a channel. Content must already respect the
    /// outbound size ceiling.
    pub async fn create_message(&self, channel_id: &str, content: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/channels/{channel_id}/messages", self.base_url))
            .header(AUTHORIZATION, self.auth_header())
            .json(&json!({ "content": content }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(ERROR_BODY_SNIPPET).collect();
    Err(Error::delivery(status.as_u16(), snippet))
}

/// Delivery capability targeting one fixed recipient. The DM channel id is
/// cached after the first open and dropped again on any failed send, so the
/// next digest re-validates the channel.
pub struct DirectMessageSink {
    rest: RestClient,
    recipient_id: String,
    dm_channel: tokio::sync::Mutex<Option<String>>,
}

impl DirectMessageSink {
    pub fn new(rest: RestClient, recipient_id: impl Into<String>) -> Self {
        Self {
            rest,
            recipient_id: recipient_id.into(),
            dm_channel: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl DeliverySink for DirectMessageSink {
    async fn deliver(&self, chunks: &[String]) -> anyhow::Result<()> {
        if self.recipient_id.trim().is_empty() {
            return Err(Error::not_configured("digest recipient").into());
        }

        let mut cached = self.dm_channel.lock().await;
        let channel_id = match cached.as_ref() {
            Some(id) => id.clone(),
            None => {
                let id = self.rest.create_dm(&self.recipient_id).await?;
                *cached = Some(id.clone());
                id
            },
        };

        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.rest.create_message(&channel_id, chunk).await {
                warn!(
                    chunk = index + 1,
                    total = chunks.len(),
                    error = %e,
                    "chunk delivery failed, aborting digest"
                );
                *cached = None;
                return Err(e.into());
            }
        }

        info!(chunks = chunks.len(), "digest chunks delivered");
        Ok(())
    }
}
