use serde::{Deserialize, Serialize};

/// A single retained inbound message. Immutable once stored; removed only
/// when it falls outside the retention window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Platform-assigned message id.
    pub id: String,
    pub author_id: String,
    /// Display name shown in the rendered digest.
    pub author_name: String,
    pub content: String,
    /// Channel the message arrived on.
    pub channel_id: String,
    /// Arrival time, epoch millis.
    pub received_at_ms: u64,
}
