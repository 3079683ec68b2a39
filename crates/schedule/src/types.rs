//! Trigger data types.

use serde::{Deserialize, Serialize};

/// When the trigger fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TriggerSchedule {
    /// Cron expression (5-field standard or 6-field with seconds), UTC.
    Cron { expr: String },
    /// Fixed hour-of-day, UTC. Rolls to tomorrow once today's occurrence
    /// has passed.
    Daily { hour: u32 },
    /// Fire once, `delay_ms` after the trigger is enabled, then self-disable.
    Once { delay_ms: u64 },
}

impl TriggerSchedule {
    #[must_use]
    pub fn mode(&self) -> TriggerMode {
        match self {
            Self::Once { .. } => TriggerMode::OneShot,
            Self::Cron { .. } | Self::Daily { .. } => TriggerMode::Recurring,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TriggerMode {
    Recurring,
    OneShot,
}

/// Outcome of a single firing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FireStatus {
    Delivered,
    Skipped,
    Failed,
}

/// What to do when the selected window holds no events.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EmptyWindowPolicy {
    /// Skip rendering and delivery entirely.
    #[default]
    Skip,
    /// Deliver the degenerate "no activity" digest.
    Notice,
}

/// Mutable runtime state of the trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerState {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_fire_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<FireStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Summary status of the trigger, for operator reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerStatus {
    pub running: bool,
    pub enabled: bool,
    pub mode: TriggerMode,
    pub next_fire_at_ms: Option<u64>,
    pub last_fired_at_ms: Option<u64>,
    pub last_status: Option<FireStatus>,
    pub last_error: Option<String>,
}
