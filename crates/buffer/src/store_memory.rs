//! In-memory store for tests and ephemeral deployments.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Result, event::Event, store::BufferStore};

#[derive(Default)]
pub struct InMemoryStore {
    events: Mutex<Vec<Event>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BufferStore for InMemoryStore {
    async fn load(&self) -> Result<Vec<Event>> {
        Ok(self.events.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn save(&self, events: &[Event]) -> Result<()> {
        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = events.to_vec();
        Ok(())
    }
}
