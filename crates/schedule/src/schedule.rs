//! Next-fire computation for all trigger kinds.

use {
    chrono::{DateTime, Days},
    cron::Schedule,
};

use crate::{
    error::{Error, Result},
    types::TriggerSchedule,
};

/// Compute the next fire time (epoch millis, strictly after `now_ms`) for a
/// given schedule.
pub fn compute_next_fire(schedule: &TriggerSchedule, now_ms: u64) -> Result<Option<u64>> {
    match schedule {
        TriggerSchedule::Cron { expr } => {
            let schedule: Schedule = expr
                .parse()
                .or_else(|_| {
                    // The `cron` crate requires 7 fields (sec min hour dom month dow year).
                    // Operators typically provide 5 fields (min hour dom month dow).
                    // Prepend "0" for seconds and append "*" for year.
                    let padded = format!("0 {expr} *");
                    padded.parse::<Schedule>()
                })
                .map_err(|e| Error::invalid_schedule(format!("bad cron expression '{expr}': {e}")))?;

            let now_dt = DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_default();
            Ok(schedule
                .after(&now_dt)
                .next()
                .map(|dt| dt.timestamp_millis() as u64))
        },
        TriggerSchedule::Daily { hour } => {
            let today_at = DateTime::from_timestamp_millis(now_ms as i64)
                .unwrap_or_default()
                .date_naive()
                .and_hms_opt(*hour, 0, 0)
                .ok_or_else(|| Error::invalid_schedule(format!("bad hour of day: {hour}")))?
                .and_utc();

            // Strictly forward: an occurrence at or before `now` rolls to
            // tomorrow, so the same target hour never fires twice.
            let next = if today_at.timestamp_millis() as u64 > now_ms {
                today_at
            } else {
                today_at + Days::new(1)
            };
            Ok(Some(next.timestamp_millis() as u64))
        },
        TriggerSchedule::Once { delay_ms } => Ok(Some(now_ms + delay_ms)),
    }
}
