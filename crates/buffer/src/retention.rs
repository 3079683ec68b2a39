//! Sliding-window retention over inbound events.

use crate::event::Event;

/// Result of offering an event to the buffer. Filtering happens here, at
/// record time, not later in the digest path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Event accepted and appended.
    Stored,
    /// Rejected: authored by a bot or system account.
    BotAuthor,
    /// Rejected: arrived on a channel other than the configured source.
    WrongChannel,
}

/// Bounded, time-windowed log of inbound events, append-only in arrival
/// order. Pruning runs opportunistically on every record and may lag by at
/// most one scheduling tick otherwise.
#[derive(Debug, Clone)]
pub struct RetentionBuffer {
    source_channel_id: String,
    window_ms: u64,
    events: Vec<Event>,
}

impl RetentionBuffer {
    pub fn new(source_channel_id: impl Into<String>, window_ms: u64) -> Self {
        Self {
            source_channel_id: source_channel_id.into(),
            window_ms,
            events: Vec::new(),
        }
    }

    /// The retention window this buffer was configured with.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offer an event. Bot authors and non-source channels are rejected;
    /// accepted events are appended in arrival order and the buffer is
    /// pruned against the event's own timestamp.
    pub fn record(&mut self, event: Event, author_is_bot: bool) -> RecordOutcome {
        if author_is_bot {
            return RecordOutcome::BotAuthor;
        }
        if event.channel_id != self.source_channel_id {
            return RecordOutcome::WrongChannel;
        }

        let now_ms = event.received_at_ms;
        self.events.push(event);
        self.prune(now_ms, self.window_ms);
        RecordOutcome::Stored
    }

    /// All events with `received_at_ms >= now_ms - window_ms`, ascending by
    /// arrival time. The explicit sort covers callers that ingest replayed
    /// or out-of-order history.
    pub fn window(&self, now_ms: u64, window_ms: u64) -> Vec<Event> {
        let cutoff = now_ms.saturating_sub(window_ms);
        let mut selected: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.received_at_ms >= cutoff)
            .cloned()
            .collect();
        selected.sort_by_key(|e| e.received_at_ms);
        selected
    }

    /// Drop events strictly older than the cutoff. Idempotent. Returns the
    /// number of events removed.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(window_ms);
        let before = self.events.len();
        self.events.retain(|e| e.received_at_ms >= cutoff);
        before - self.events.len()
    }

    /// Copy of the raw event log, for persistence.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.clone()
    }

    /// Replace the event log, for rehydration at startup.
    pub fn restore(&mut self, events: Vec<Event>) {
        self.events = events;
    }
}
