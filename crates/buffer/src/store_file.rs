//! JSON file-backed buffer store with atomic writes.

use std::path::PathBuf;

use {async_trait::async_trait, tokio::fs};

use crate::{Error, Result, event::Event, store::BufferStore};

/// File-backed store. The whole event window lives in a single JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create a store using the default `~/.recap/events.json` layout.
    pub fn default_path() -> Result<Self> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| Error::message("cannot determine home directory"))?;
        Ok(Self::new(home.join(".recap").join("events.json")))
    }

    async fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Atomic write: write to temp, rename over target, keep `.bak`.
    async fn atomic_write(&self, events: &[Event]) -> Result<()> {
        self.ensure_dirs().await?;
        let json = serde_json::to_string_pretty(events)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, json.as_bytes()).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let bak = self.path.with_extension("json.bak");
            let _ = fs::rename(&self.path, &bak).await;
        }

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BufferStore for FileStore {
    async fn load(&self) -> Result<Vec<Event>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        let events: Vec<Event> = serde_json::from_str(&data)?;
        Ok(events)
    }

    async fn save(&self, events: &[Event]) -> Result<()> {
        self.atomic_write(events).await
    }
}
