use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vmemo_core::VoiceNote;

use crate::{KeyValueSlot, Result, StoreError};

/// The persisted, insertion-ordered collection of voice notes.
///
/// The store is the only writer of the blob under its key. Every mutation is
/// a load-modify-store cycle held under a write lock, so two mutations never
/// interleave their reads and writes.
pub struct VoiceNoteStore {
    slot: Arc<dyn KeyValueSlot>,
    key: String,
    write_lock: Mutex<()>,
}

impl VoiceNoteStore {
    pub fn new(slot: Arc<dyn KeyValueSlot>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Key the collection is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the full collection. A slot that was never written is an empty
    /// collection, not an error.
    pub async fn load_all(&self) -> Result<Vec<VoiceNote>> {
        let Some(blob) = self.slot.get(&self.key).await? else {
            debug!(key = %self.key, "No persisted notes yet");
            return Ok(Vec::new());
        };

        serde_json::from_str(&blob).map_err(|source| StoreError::Corrupt {
            key: self.key.clone(),
            source,
        })
    }

    /// Append a note at the end of the collection. An existing note with the
    /// same URI is dropped first so the URI stays unique.
    pub async fn append(&self, note: VoiceNote) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut notes = self.load_all().await?;
        let before = notes.len();
        notes.retain(|n| n.uri != note.uri);
        if notes.len() != before {
            warn!(uri = %note.uri, "Replacing note with duplicate uri");
        }

        info!(uri = %note.uri, name = %note.name, duration = note.duration, "Saving note");
        notes.push(note);
        self.store_all(&notes).await
    }

    /// Remove the note with `uri`. Returns whether a note was removed; a
    /// missing URI leaves the collection untouched.
    pub async fn delete_by_uri(&self, uri: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut notes = self.load_all().await?;
        let Some(index) = notes.iter().position(|n| n.uri == uri) else {
            debug!(uri, "Nothing to delete");
            return Ok(false);
        };

        notes.remove(index);
        info!(uri, "Deleted note");
        self.store_all(&notes).await?;
        Ok(true)
    }

    async fn store_all(&self, notes: &[VoiceNote]) -> Result<()> {
        let blob = serde_json::to_string(notes)?;
        self.slot.set(&self.key, blob).await
    }
}

/// Notes whose name contains `query`, ignoring case. An empty query returns
/// every note in order.
pub fn filter_by_name(notes: &[VoiceNote], query: &str) -> Vec<VoiceNote> {
    notes
        .iter()
        .filter(|note| note.name_matches(query))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use vmemo_core::DEFAULT_STORAGE_KEY;

    use super::*;
    use crate::{FileSlot, MemorySlot};

    fn note(uri: &str, name: &str, duration: u64) -> VoiceNote {
        VoiceNote {
            uri: uri.to_string(),
            name: name.to_string(),
            duration,
            date: "2024-05-01 09:30:00".to_string(),
        }
    }

    fn memory_store() -> (MemorySlot, VoiceNoteStore) {
        let slot = MemorySlot::new();
        let store = VoiceNoteStore::new(Arc::new(slot.clone()), DEFAULT_STORAGE_KEY);
        (slot, store)
    }

    #[tokio::test]
    async fn test_load_all_first_run_is_empty() {
        let (slot, store) = memory_store();
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(slot.peek(DEFAULT_STORAGE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_append_goes_to_the_end_exactly_once() {
        let (_slot, store) = memory_store();
        store.append(note("a", "First", 1)).await.unwrap();
        store.append(note("b", "Second", 2)).await.unwrap();

        let notes = store.load_all().await.unwrap();
        let uris: Vec<_> = notes.iter().map(|n| n.uri.as_str()).collect();
        assert_eq!(uris, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_append_duplicate_uri_keeps_one_at_end() {
        let (_slot, store) = memory_store();
        store.append(note("a", "First", 1)).await.unwrap();
        store.append(note("b", "Second", 2)).await.unwrap();
        store.append(note("a", "Again", 3)).await.unwrap();

        let notes = store.load_all().await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1], note("a", "Again", 3));
        assert_eq!(notes.iter().filter(|n| n.uri == "a").count(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_uri() {
        let (_slot, store) = memory_store();
        store.append(note("a", "First", 1)).await.unwrap();
        store.append(note("b", "Second", 2)).await.unwrap();

        assert!(store.delete_by_uri("a").await.unwrap());
        let notes = store.load_all().await.unwrap();
        assert_eq!(notes, vec![note("b", "Second", 2)]);
    }

    #[tokio::test]
    async fn test_delete_missing_uri_is_noop() {
        let (slot, store) = memory_store();
        store.append(note("a", "First", 1)).await.unwrap();
        let before = slot.peek(DEFAULT_STORAGE_KEY);

        assert!(!store.delete_by_uri("missing").await.unwrap());
        assert_eq!(slot.peek(DEFAULT_STORAGE_KEY), before);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blob_is_json_array_of_notes() {
        let (slot, store) = memory_store();
        store.append(note("file:///a.wav", "Memo", 5)).await.unwrap();

        let blob = slot.peek(DEFAULT_STORAGE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "uri": "file:///a.wav",
                "name": "Memo",
                "duration": 5,
                "date": "2024-05-01 09:30:00",
            }])
        );
    }

    #[tokio::test]
    async fn test_loads_legacy_blob() {
        let (slot, store) = memory_store();
        slot.insert(
            DEFAULT_STORAGE_KEY,
            r#"[{"uri":"file:///old.m4a","date":"3/4/2024, 8:00:00 PM"}]"#,
        );

        let notes = store.load_all().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].name, "Unnamed Recording");
        assert_eq!(notes[0].duration, 0);
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_reported() {
        let (slot, store) = memory_store();
        slot.insert(DEFAULT_STORAGE_KEY, "{not json");

        let err = store.load_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // A failed load must not clobber the blob.
        assert!(store.append(note("a", "First", 1)).await.is_err());
        assert_eq!(slot.peek(DEFAULT_STORAGE_KEY).as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_reopen_from_file_yields_last_persisted() {
        let temp = tempdir().expect("Failed to create temp dir");
        let store = VoiceNoteStore::new(Arc::new(FileSlot::new(temp.path())), DEFAULT_STORAGE_KEY);
        store.append(note("a", "First", 1)).await.unwrap();
        store.append(note("b", "Second", 2)).await.unwrap();
        store.delete_by_uri("a").await.unwrap();
        let persisted = store.load_all().await.unwrap();
        drop(store);

        let reopened =
            VoiceNoteStore::new(Arc::new(FileSlot::new(temp.path())), DEFAULT_STORAGE_KEY);
        assert_eq!(reopened.load_all().await.unwrap(), persisted);
    }

    #[test]
    fn test_filter_by_name() {
        let notes = vec![
            note("a", "Team Meeting", 30),
            note("b", "groceries", 4),
            note("c", "Meeting notes", 12),
        ];

        assert_eq!(filter_by_name(&notes, ""), notes);

        let found = filter_by_name(&notes, "MEETING");
        let uris: Vec<_> = found.iter().map(|n| n.uri.as_str()).collect();
        assert_eq!(uris, ["a", "c"]);

        assert!(filter_by_name(&notes, "dentist").is_empty());
        assert_eq!(notes.len(), 3);
    }
}
