//! Voice-note records and the rounding rules used to derive their numbers.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_NOTE_NAME;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A saved recording. Immutable once persisted; notes are only ever appended
/// or deleted.
///
/// Older blobs carry only `uri` and `date`, so every other field falls back to
/// a default when missing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoiceNote {
    /// Handle to the audio resource, unique within the collection
    pub uri: String,

    /// User supplied label
    #[serde(default = "default_name")]
    pub name: String,

    /// Length of the recording in whole seconds
    #[serde(default)]
    pub duration: u64,

    /// Human readable creation time
    #[serde(default)]
    pub date: String,
}

fn default_name() -> String {
    DEFAULT_NOTE_NAME.to_string()
}

impl VoiceNote {
    /// Create a note stamped with the current local time.
    pub fn new(uri: impl Into<String>, name: impl Into<String>, duration: u64) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            duration,
            date: Local::now().format(DATE_FORMAT).to_string(),
        }
    }

    /// Case-insensitive substring match on the name. An empty query matches
    /// everything.
    pub fn name_matches(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// A finished recording that has not been named or saved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNote {
    pub uri: String,
    pub duration_secs: u64,
}

impl CandidateNote {
    /// Create a candidate from the raw figures reported by the hardware.
    pub fn from_millis(uri: impl Into<String>, duration_millis: u64) -> Self {
        Self {
            uri: uri.into(),
            duration_secs: reported_secs(duration_millis),
        }
    }

    /// Turn the candidate into a note with the given name.
    pub fn into_note(self, name: impl Into<String>) -> VoiceNote {
        VoiceNote::new(self.uri, name, self.duration_secs)
    }
}

/// Whole seconds shown to the user as a clip length. Rounds up so that a
/// clip of 4.2s is reported as 5s.
pub fn reported_secs(millis: u64) -> u64 {
    millis.div_ceil(1000)
}

/// Whole seconds that have fully elapsed. Used for counters and playback
/// position.
pub fn elapsed_secs(millis: u64) -> u64 {
    millis / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_secs_rounds_up() {
        assert_eq!(reported_secs(0), 0);
        assert_eq!(reported_secs(1), 1);
        assert_eq!(reported_secs(4200), 5);
        assert_eq!(reported_secs(5000), 5);
        assert_eq!(reported_secs(5001), 6);
    }

    #[test]
    fn test_elapsed_secs_rounds_down() {
        assert_eq!(elapsed_secs(999), 0);
        assert_eq!(elapsed_secs(1000), 1);
        assert_eq!(elapsed_secs(4999), 4);
    }

    #[test]
    fn test_candidate_from_millis() {
        let candidate = CandidateNote::from_millis("file:///a.wav", 4200);
        assert_eq!(candidate.duration_secs, 5);

        let note = candidate.into_note("Memo");
        assert_eq!(note.uri, "file:///a.wav");
        assert_eq!(note.name, "Memo");
        assert_eq!(note.duration, 5);
        assert!(!note.date.is_empty());
    }

    #[test]
    fn test_legacy_note_defaults() {
        let note: VoiceNote =
            serde_json::from_str(r#"{"uri":"file:///old.m4a","date":"1/2/2024, 10:00:00 AM"}"#)
                .unwrap();
        assert_eq!(note.name, DEFAULT_NOTE_NAME);
        assert_eq!(note.duration, 0);
        assert_eq!(note.date, "1/2/2024, 10:00:00 AM");
    }

    #[test]
    fn test_name_matches() {
        let note = VoiceNote::new("file:///a.wav", "Groceries List", 3);
        assert!(note.name_matches(""));
        assert!(note.name_matches("  "));
        assert!(note.name_matches("grocer"));
        assert!(note.name_matches("LIST"));
        assert!(!note.name_matches("meeting"));
    }
}
