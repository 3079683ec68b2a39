//! Digest rendering and delivery-safe chunking.
//!
//! Turns a window of retained events into a human-readable digest and splits
//! it against the outbound message size ceiling.

pub mod chunk;
pub mod render;

pub use {
    chunk::{MAX_CHUNK_LEN, chunk_lines},
    render::{RenderOptions, render_digest, render_empty_notice},
};
