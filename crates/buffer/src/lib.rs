//! Time-windowed retention buffer for inbound channel messages.
//! Events are filtered at record time, pruned against a sliding window,
//! and optionally persisted through a [`store::BufferStore`].

pub mod error;
pub mod event;
pub mod handle;
pub mod retention;
pub mod store;
pub mod store_file;
pub mod store_memory;

pub use {
    error::{Error, Result},
    event::Event,
    handle::BufferHandle,
    retention::{RecordOutcome, RetentionBuffer},
    store::BufferStore,
    store_file::FileStore,
    store_memory::InMemoryStore,
};
