//! Shared access to one retention buffer from both the gateway session
//! (ingestion) and the scheduler (digest selection).

use std::sync::Arc;

use {tokio::sync::RwLock, tracing::warn};

use crate::{
    Result,
    event::Event,
    retention::{RecordOutcome, RetentionBuffer},
    store::BufferStore,
};

/// Cloneable handle around one [`RetentionBuffer`]. Mutations persist to the
/// attached store when one is configured; persistence failures are logged and
/// never dropped into the ingestion path.
#[derive(Clone)]
pub struct BufferHandle {
    window_ms: u64,
    inner: Arc<RwLock<RetentionBuffer>>,
    store: Option<Arc<dyn BufferStore>>,
}

impl BufferHandle {
    pub fn new(buffer: RetentionBuffer) -> Self {
        Self {
            window_ms: buffer.window_ms(),
            inner: Arc::new(RwLock::new(buffer)),
            store: None,
        }
    }

    pub fn with_store(buffer: RetentionBuffer, store: Arc<dyn BufferStore>) -> Self {
        Self {
            window_ms: buffer.window_ms(),
            inner: Arc::new(RwLock::new(buffer)),
            store: Some(store),
        }
    }

    /// The configured retention window.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Load persisted events, drop whatever already expired, and write the
    /// pruned state back. Returns the number of in-window events restored.
    pub async fn hydrate(&self, now_ms: u64) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let events = store.load().await?;
        let mut buffer = self.inner.write().await;
        buffer.restore(events);
        buffer.prune(now_ms, self.window_ms);
        let restored = buffer.len();
        store.save(&buffer.snapshot()).await?;
        Ok(restored)
    }

    pub async fn record(&self, event: Event, author_is_bot: bool) -> RecordOutcome {
        let snapshot = {
            let mut buffer = self.inner.write().await;
            let outcome = buffer.record(event, author_is_bot);
            if outcome != RecordOutcome::Stored {
                return outcome;
            }
            buffer.snapshot()
        };
        self.persist(&snapshot).await;
        RecordOutcome::Stored
    }

    pub async fn window(&self, now_ms: u64) -> Vec<Event> {
        self.inner.read().await.window(now_ms, self.window_ms)
    }

    /// Prune against the configured window. Returns the number dropped.
    pub async fn prune(&self, now_ms: u64) -> usize {
        let (dropped, snapshot) = {
            let mut buffer = self.inner.write().await;
            let dropped = buffer.prune(now_ms, self.window_ms);
            (dropped, buffer.snapshot())
        };
        if dropped > 0 {
            self.persist(&snapshot).await;
        }
        dropped
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    async fn persist(&self, events: &[Event]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(events).await {
                warn!(error = %e, "failed to persist retention buffer");
            }
        }
    }
}
