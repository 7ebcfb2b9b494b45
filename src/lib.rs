//! Record, list, play back and search voice memos.
//!
//! [`VoiceMemos`] is the entry point. It runs on a single thread inside a
//! `tokio::task::LocalSet` and reports what happens through [`MemoEvent`]s.

use tracing_subscriber::EnvFilter;
// Re-export from sub-crates
pub use vmemo_audio::{
    AudioBackend, AudioError, CpalBackend, FinishedRecording, PlaybackHandle, PlaybackStatus,
    RecordingHandle,
};
pub use vmemo_core::{
    APP_NAME, CandidateNote, Config, ConfigManager, DEFAULT_LOG_LEVEL, DEFAULT_NOTE_NAME,
    DEFAULT_STORAGE_KEY, EmptyNamePolicy, Permission, PermissionGate, PlaybackProgress,
    PlaybackState, RecorderState, StaticPermission, VoiceNote,
};
pub use vmemo_store::{
    FileSlot, KeyValueSlot, MemorySlot, StoreError, VoiceNoteStore, filter_by_name,
};

mod error;
pub mod event;
mod memos;
mod playback;
mod recording;
mod task;

pub use error::{MemoError, Result};
pub use event::MemoEvent;
pub use memos::VoiceMemos;
pub use playback::PlaybackController;
pub use recording::RecordingController;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global fmt subscriber, filtered by `VMEMO_LOG`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VMEMO_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .try_init()
        .ok();
}
