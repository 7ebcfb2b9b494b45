//! Recorder and player state types.

/// The current state of the recording lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// No recording and no candidate waiting for a name
    Idle,
    /// Actively recording audio
    Recording,
    /// Recording stopped, the candidate is waiting to be named and saved
    PendingName,
}

/// The current state of the playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Resource loaded but not yet producing sound
    Loaded,
    Playing,
}

/// Snapshot of the active playback session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackProgress {
    pub uri: String,
    pub state: PlaybackState,
    pub position_secs: u64,
    pub duration_secs: u64,
}

impl PlaybackProgress {
    /// Seconds left until the end of the clip.
    pub fn remaining_secs(&self) -> u64 {
        self.duration_secs.saturating_sub(self.position_secs)
    }
}
