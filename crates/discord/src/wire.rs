//! Gateway wire frames and payloads.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
};

/// Gateway control opcodes this client speaks.
pub mod opcode {
    /// Application-level event frame.
    pub const DISPATCH: u8 = 0;
    /// Bidirectional: the remote may request one, the client sends one per
    /// interval.
    pub const HEARTBEAT: u8 = 1;
    /// Handshake payload authenticating the client.
    pub const IDENTIFY: u8 = 2;
    /// First frame from the remote, carries the heartbeat interval.
    pub const HELLO: u8 = 10;
    /// Acknowledges a client heartbeat.
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Guild lifecycle events.
pub const INTENT_GUILDS: u64 = 1;
/// Message-create events in guild channels.
pub const INTENT_GUILD_MESSAGES: u64 = 1 << 9;
/// Message content payloads.
pub const INTENT_MESSAGE_CONTENT: u64 = 1 << 15;

/// Base capability bitmask: guild + message-create events.
#[must_use]
pub fn default_intents() -> u64 {
    INTENT_GUILDS | INTENT_GUILD_MESSAGES
}

/// One text frame on the gateway socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Heartbeat frame echoing the last sequence number seen from the remote
/// (null before the first dispatch).
#[must_use]
pub fn heartbeat_frame(sequence: Option<u64>) -> GatewayFrame {
    GatewayFrame {
        op: opcode::HEARTBEAT,
        d: match sequence {
            Some(n) => Value::from(n),
            None => Value::Null,
        },
        s: None,
        t: None,
    }
}

/// Identify frame: credential, capability bitmask, client environment.
#[must_use]
pub fn identify_frame(token: &str, intents: u64) -> GatewayFrame {
    GatewayFrame {
        op: opcode::IDENTIFY,
        d: json!({
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "recap",
                "device": "recap",
            },
        }),
        s: None,
        t: None,
    }
}

/// HELLO payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

/// READY dispatch payload. The session id is kept for diagnostics only;
/// resumption is not attempted.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl MessageAuthor {
    /// Display name: the server-wide name when set, else the account name.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.global_name
            .clone()
            .unwrap_or_else(|| self.username.clone())
    }
}

/// MESSAGE_CREATE dispatch payload, reduced to the fields this client reads.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: MessageAuthor,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl MessageCreate {
    /// Creation time as epoch millis, when the payload carries a parseable
    /// timestamp.
    #[must_use]
    pub fn created_at_ms(&self) -> Option<u64> {
        let raw = self.timestamp.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.timestamp_millis() as u64)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intents_is_513() {
        assert_eq!(default_intents(), 513);
    }

    #[test]
    fn heartbeat_without_sequence_serializes_null() {
        let json = serde_json::to_string(&heartbeat_frame(None)).unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn heartbeat_echoes_sequence() {
        let json = serde_json::to_string(&heartbeat_frame(Some(42))).unwrap();
        assert_eq!(json, r#"{"op":1,"d":42}"#);
    }

    #[test]
    fn identify_carries_token_and_intents() {
        let frame = identify_frame("secret-token", default_intents());
        assert_eq!(frame.op, opcode::IDENTIFY);
        assert_eq!(frame.d["token"], "secret-token");
        assert_eq!(frame.d["intents"], 513);
        assert!(frame.d["properties"]["browser"].is_string());
    }

    #[test]
    fn frame_roundtrip() {
        let text = r#"{"op":0,"d":{"session_id":"abc"},"s":7,"t":"READY"}"#;
        let frame: GatewayFrame = serde_json::from_str(text).unwrap();
        assert_eq!(frame.op, opcode::DISPATCH);
        assert_eq!(frame.s, Some(7));
        assert_eq!(frame.t.as_deref(), Some("READY"));

        let ready: Ready = serde_json::from_value(frame.d).unwrap();
        assert_eq!(ready.session_id, "abc");
    }

    #[test]
    fn hello_parses_interval() {
        let hello: Hello = serde_json::from_str(r#"{"heartbeat_interval":41250}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 41_250);
    }

    #[test]
    fn message_create_parses_and_prefers_global_name() {
        let raw = r#"{
            "id": "111",
            "channel_id": "222",
            "content": "hello there",
            "timestamp": "2024-02-01T09:30:00.000000+00:00",
            "author": {"id": "333", "username": "maia_b", "global_name": "Maia", "bot": false}
        }"#;
        let msg: MessageCreate = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.author.display_name(), "Maia");
        assert!(!msg.author.bot);
        assert!(msg.created_at_ms().is_some());
    }

    #[test]
    fn message_author_falls_back_to_username() {
        let author: MessageAuthor =
            serde_json::from_str(r#"{"id":"1","username":"maia_b"}"#).unwrap();
        assert_eq!(author.display_name(), "maia_b");
        assert!(!author.bot);
    }
}
