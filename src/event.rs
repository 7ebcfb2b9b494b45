//! Events for the host's event loop.

use vmemo_core::PlaybackProgress;

/// Events emitted by the controllers, delivered on the receiver returned by
/// [`VoiceMemos::open`](crate::VoiceMemos::open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoEvent {
    RecordingStarted,
    /// One tick per second while recording
    RecordingTick { elapsed_secs: u64 },
    /// The configured maximum duration was reached; sent once per recording
    MaxDurationReached { elapsed_secs: u64 },
    RecordingStopped { uri: String, duration_secs: u64 },
    PlaybackStarted { uri: String, duration_secs: u64 },
    /// Position moved to a new whole second
    PlaybackProgress(PlaybackProgress),
    /// Playback reached the end of the clip on its own
    PlaybackFinished { uri: String },
    /// Playback was stopped by a call
    PlaybackStopped { uri: String },
    /// The note list changed
    NotesChanged { count: usize },
}
