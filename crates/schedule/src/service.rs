//! Digest trigger service: timer loop, firing, single-delivery guarantees.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    chrono_tz::Tz,
    tokio::{
        sync::{Mutex, Notify, RwLock},
        task::JoinHandle,
    },
    tracing::{debug, error, info},
};

use {
    recap_buffer::BufferHandle,
    recap_digest::{MAX_CHUNK_LEN, RenderOptions, chunk_lines, render_digest, render_empty_notice},
};

use crate::{
    Result,
    schedule::compute_next_fire,
    sink::DeliverySink,
    types::{EmptyWindowPolicy, FireStatus, TriggerSchedule, TriggerState, TriggerStatus},
};

/// Static trigger configuration.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub schedule: TriggerSchedule,
    pub empty_window: EmptyWindowPolicy,
    /// Timezone used for time-of-day display in rendered digests.
    pub timezone: Tz,
    /// Whether the trigger starts enabled.
    pub enabled: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            schedule: TriggerSchedule::Daily { hour: 9 },
            empty_window: EmptyWindowPolicy::default(),
            timezone: Tz::UTC,
            enabled: true,
        }
    }
}

/// The digest trigger. Owns its own timer; stopping it never touches the
/// gateway session.
pub struct DigestService {
    buffer: BufferHandle,
    sink: Arc<dyn DeliverySink>,
    schedule: TriggerSchedule,
    empty_window: EmptyWindowPolicy,
    timezone: Tz,
    state: RwLock<TriggerState>,
    running: RwLock<bool>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
    wake_notify: Arc<Notify>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl DigestService {
    pub fn new(buffer: BufferHandle, sink: Arc<dyn DeliverySink>, config: DigestConfig) -> Arc<Self> {
        Arc::new(Self {
            buffer,
            sink,
            schedule: config.schedule,
            empty_window: config.empty_window,
            timezone: config.timezone,
            state: RwLock::new(TriggerState {
                enabled: config.enabled,
                ..TriggerState::default()
            }),
            running: RwLock::new(false),
            timer_handle: Mutex::new(None),
            wake_notify: Arc::new(Notify::new()),
        })
    }

    /// Compute the first fire time and start the timer loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.enabled {
                state.next_fire_at_ms = compute_next_fire(&self.schedule, now_ms())?;
            }
        }

        *self.running.write().await = true;

        let svc = Arc::clone(self);
        let handle = tokio::spawn(async move {
            svc.timer_loop().await;
        });
        *self.timer_handle.lock().await = Some(handle);

        info!(schedule = ?self.schedule, "digest trigger started");
        Ok(())
    }

    /// Stop the timer loop. Cancels the pending fire without affecting the
    /// gateway session.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.wake_notify.notify_one();

        let mut handle = self.timer_handle.lock().await;
        if let Some(h) = handle.take() {
            h.abort();
        }
        info!("digest trigger stopped");
    }

    /// Enable the trigger. For one-shot schedules the delay is anchored here.
    pub async fn enable(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.enabled = true;
            state.next_fire_at_ms = compute_next_fire(&self.schedule, now_ms())?;
        }
        self.wake_notify.notify_one();
        info!("digest trigger enabled");
        Ok(())
    }

    /// Disable the trigger. Takes effect before the next computed fire time.
    pub async fn disable(&self) {
        {
            let mut state = self.state.write().await;
            state.enabled = false;
            state.next_fire_at_ms = None;
        }
        self.wake_notify.notify_one();
        info!("digest trigger disabled");
    }

    /// Force an immediate fire, bypassing the enabled check. Used by the
    /// operator surface for manual verification.
    pub async fn run_now(&self) -> FireStatus {
        self.fire(true).await
    }

    pub async fn status(&self) -> TriggerStatus {
        let state = self.state.read().await.clone();
        TriggerStatus {
            running: *self.running.read().await,
            enabled: state.enabled,
            mode: self.schedule.mode(),
            next_fire_at_ms: state.next_fire_at_ms,
            last_fired_at_ms: state.last_fired_at_ms,
            last_status: state.last_status,
            last_error: state.last_error,
        }
    }

    // ── Internal ────────────────────────────────────────────────────────

    async fn timer_loop(self: &Arc<Self>) {
        loop {
            if !*self.running.read().await {
                break;
            }

            let sleep_ms = self.ms_until_next_wake().await;
            if sleep_ms > 0 {
                let notify = Arc::clone(&self.wake_notify);
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {},
                    () = notify.notified() => {
                        debug!("trigger timer woken by notify");
                        continue;
                    },
                }
            }

            if !*self.running.read().await {
                break;
            }

            self.process_due().await;
        }
    }

    async fn ms_until_next_wake(&self) -> u64 {
        let state = self.state.read().await;
        match state.next_fire_at_ms.filter(|_| state.enabled) {
            Some(at) => at.saturating_sub(now_ms()),
            // Poll every 60s while idle or disabled.
            None => 60_000,
        }
    }

    async fn process_due(self: &Arc<Self>) {
        let due = {
            let state = self.state.read().await;
            state.enabled && state.next_fire_at_ms.is_some_and(|t| t <= now_ms())
        };
        if due {
            // Awaited inline: the loop cannot re-enter a fire, so each
            // trigger delivers at most once.
            self.fire(false).await;
        }
    }

    async fn fire(&self, force: bool) -> FireStatus {
        let fired_at = now_ms();
        self.buffer.prune(fired_at).await;
        let events = self.buffer.window(fired_at).await;

        let opts = RenderOptions {
            window_ms: self.buffer.window_ms(),
            timezone: self.timezone,
        };
        let rendered = if events.is_empty() {
            match self.empty_window {
                EmptyWindowPolicy::Skip => None,
                EmptyWindowPolicy::Notice => Some(render_empty_notice(&opts)),
            }
        } else {
            Some(render_digest(&events, &opts))
        };

        let (status, last_error) = match rendered {
            None => {
                debug!("window empty, skipping digest");
                (FireStatus::Skipped, None)
            },
            Some(digest) => {
                // The trigger may have been disabled while this fire was in
                // flight; check one last time before any delivery attempt.
                if !force && !self.state.read().await.enabled {
                    debug!("trigger disabled mid-flight, skipping delivery");
                    (FireStatus::Skipped, None)
                } else {
                    let chunks = chunk_lines(&digest, MAX_CHUNK_LEN);
                    match self.sink.deliver(&chunks).await {
                        Ok(()) => {
                            info!(
                                events = events.len(),
                                chunks = chunks.len(),
                                "digest delivered"
                            );
                            (FireStatus::Delivered, None)
                        },
                        Err(e) => {
                            error!(error = %e, "digest delivery failed");
                            (FireStatus::Failed, Some(e.to_string()))
                        },
                    }
                }
            },
        };

        self.finish_fire(fired_at, status, last_error).await;
        status
    }

    /// Record the outcome and advance the schedule. One-shot triggers
    /// disable themselves here after their single fire.
    async fn finish_fire(&self, fired_at: u64, status: FireStatus, last_error: Option<String>) {
        let one_shot = matches!(self.schedule, TriggerSchedule::Once { .. });
        {
            let mut state = self.state.write().await;
            state.last_fired_at_ms = Some(fired_at);
            state.last_status = Some(status);
            state.last_error = last_error;

            if one_shot {
                state.enabled = false;
                state.next_fire_at_ms = None;
            } else if state.enabled {
                // Strictly forward from now; a missed window is not backfilled.
                state.next_fire_at_ms =
                    compute_next_fire(&self.schedule, now_ms()).unwrap_or(None);
            }
        }
        self.wake_notify.notify_one();
    }
}
