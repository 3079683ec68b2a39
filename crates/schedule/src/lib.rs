//! Digest trigger: decides when a digest is rendered and delivered, and
//! guarantees single delivery per firing. Recurring triggers follow a cron
//! expression or a fixed hour-of-day (UTC); one-shot triggers fire once after
//! a fixed delay and then disable themselves.

pub mod error;
pub mod schedule;
pub mod service;
pub mod sink;
pub mod types;

pub use {
    error::{Error, Result},
    schedule::compute_next_fire,
    service::{DigestConfig, DigestService},
    sink::DeliverySink,
    types::{EmptyWindowPolicy, FireStatus, TriggerMode, TriggerSchedule, TriggerState, TriggerStatus},
};
