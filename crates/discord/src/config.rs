use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::wire;

/// Default gateway endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Backoff contract: 5s base doubling to a 60s ceiling.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 5_000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;

/// How the session comes back after an abnormal close.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Reconnect eagerly from the close handler, after exponential backoff.
    #[default]
    Backoff,
    /// Park after a drop; an external keep-alive tick calls
    /// `ensure_connected` to reconnect.
    Deferred,
}

impl std::str::FromStr for ReconnectPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backoff" => Ok(Self::Backoff),
            "deferred" => Ok(Self::Deferred),
            other => Err(crate::Error::message(format!(
                "unknown reconnect policy '{other}' (expected backoff or deferred)"
            ))),
        }
    }
}

/// Configuration for one gateway session.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Bot credential.
    pub token: Secret<String>,
    pub gateway_url: String,
    /// Capability bitmask sent in the identify payload.
    pub intents: u64,
    pub reconnect: ReconnectPolicy,
    /// Force-close the connection when a heartbeat goes unacknowledged for
    /// one full interval.
    pub ack_timeout: bool,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl GatewayConfig {
    pub fn new(token: Secret<String>) -> Self {
        Self {
            token,
            gateway_url: DEFAULT_GATEWAY_URL.into(),
            intents: wire::default_intents(),
            reconnect: ReconnectPolicy::default(),
            ack_timeout: true,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }

    /// Fails when the credential is missing, before any connection attempt.
    pub fn validate(&self) -> crate::Result<()> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(crate::Error::not_configured("bot token"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"[REDACTED]")
            .field("gateway_url", &self.gateway_url)
            .field("intents", &self.intents)
            .field("reconnect", &self.reconnect)
            .field("ack_timeout", &self.ack_timeout)
            .finish_non_exhaustive()
    }
}
