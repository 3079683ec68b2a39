//! Composed operator status snapshot.

use serde::Serialize;

use {
    recap_discord::{SessionState, SessionStatus},
    recap_schedule::TriggerStatus,
};

/// One status snapshot across the session, trigger and buffer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub enabled: bool,
    pub connected: bool,
    pub session_id: Option<String>,
    pub messages_stored: usize,
    pub reconnect_attempts: u32,
    pub next_fire_at_ms: Option<u64>,
}

impl Status {
    pub fn compose(
        session: &SessionStatus,
        trigger: &TriggerStatus,
        messages_stored: usize,
    ) -> Self {
        Self {
            enabled: trigger.enabled,
            connected: session.state == SessionState::Connected,
            session_id: session.session_id.clone(),
            messages_stored,
            reconnect_attempts: session.reconnect_attempts,
            next_fire_at_ms: trigger.next_fire_at_ms,
        }
    }
}
