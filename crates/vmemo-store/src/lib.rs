//! Voice-note persistence for vmemo.
//!
//! The note collection lives as one JSON array under a single key of a
//! key-value slot. This crate provides the slot abstraction, a file backed
//! and an in-memory implementation, and the store that reads and writes the
//! collection through it.

mod file;
mod memory;
mod store;

use async_trait::async_trait;
pub use file::FileSlot;
pub use memory::MemorySlot;
pub use store::{VoiceNoteStore, filter_by_name};
use thiserror::Error;

/// Errors that can occur while reading or writing the persisted collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("persisted notes under {key} are corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize notes: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A named key-value persistence slot holding text blobs.
///
/// Implement this trait to back the store with another medium (platform
/// preferences, a database table, etc.)
#[async_trait]
pub trait KeyValueSlot: Send + Sync {
    /// Read the blob under `key`, `None` if nothing was ever written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the blob under `key`. Readers never observe a partial write.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove the blob under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Returns the name of this slot for logging/debugging.
    fn name(&self) -> &str;
}
