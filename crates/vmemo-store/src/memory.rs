//! In-process key-value slot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{KeyValueSlot, Result};

/// Slot backed by a shared map. Clones share the same contents, which lets a
/// test rebuild a store over the blob a previous store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw blob under `key`, bypassing the async interface.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Seed a raw blob, e.g. one written by an older release.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }
}

#[async_trait]
impl KeyValueSlot for MemorySlot {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
