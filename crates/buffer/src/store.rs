use async_trait::async_trait;

use crate::{Result, event::Event};

/// Durable snapshot of the retention buffer, written after every mutation so
/// a process restart does not silently lose in-window history.
#[async_trait]
pub trait BufferStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Event>>;
    async fn save(&self, events: &[Event]) -> Result<()>;
}
