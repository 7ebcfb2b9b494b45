//! Audio recording and playback for vmemo.
//!
//! The lifecycle controllers only talk to the traits in this crate.
//! [`CpalBackend`] is the hardware implementation: WAV files written with
//! hound, captured and played through cpal. The `test-support` feature adds
//! a scriptable in-memory backend.

mod backend;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
mod play;
mod record;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
pub use backend::CpalBackend;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum AudioError {
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// No playback device available
    #[error("no output device available")]
    NoOutputDevice,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// The resource behind a uri could not be opened or decoded
    #[error("failed to load {uri}: {reason}")]
    ResourceLoad { uri: String, reason: String },
    /// The handle was already finalized or unloaded
    #[error("audio handle already released")]
    Released,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error(transparent)]
    Wav(#[from] hound::Error),
}

impl AudioError {
    pub fn resource_load(uri: impl Into<String>, reason: impl ToString) -> Self {
        AudioError::ResourceLoad {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for audio operations.
pub type Result<T> = std::result::Result<T, AudioError>;

/// What a finalized recording left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    /// Handle to the written audio resource
    pub uri: String,
    /// Exact length as measured by the device
    pub duration_millis: u64,
}

/// Updates delivered on a playback status subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Periodic position report while playing
    Position { position_millis: u64 },
    /// Playback reached the end of the clip
    Finished,
}

/// Receiving half of a playback status subscription.
pub type StatusReceiver = mpsc::UnboundedReceiver<PlaybackStatus>;

/// Entry point to the audio hardware.
///
/// Handles are not `Send`: they live on the thread driving the event loop,
/// like the device streams behind them.
#[async_trait(?Send)]
pub trait AudioBackend {
    /// Start a new recording on the default input.
    async fn create_recording(&self) -> Result<Box<dyn RecordingHandle>>;

    /// Load the clip at `uri` for playback. Fails with
    /// [`AudioError::ResourceLoad`] when the uri is unknown or unreadable.
    async fn create_playback(&self, uri: &str) -> Result<Box<dyn PlaybackHandle>>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &str;
}

/// Handle to an active recording. When dropped without being finalized the
/// recording still ends, but its result is lost.
#[async_trait(?Send)]
pub trait RecordingHandle {
    /// Stop capturing and flush the resource. A second call fails with
    /// [`AudioError::Released`].
    async fn stop_and_finalize(&mut self) -> Result<FinishedRecording>;
}

/// Handle to a loaded clip. Dropping it unloads the clip.
pub trait PlaybackHandle {
    fn uri(&self) -> &str;

    /// Total length of the clip.
    fn duration_millis(&self) -> u64;

    fn play(&mut self) -> Result<()>;

    /// Stop producing sound. Stopping twice is fine.
    fn stop(&mut self) -> Result<()>;

    /// Subscribe to status updates. A new subscription replaces the old one.
    fn subscribe_status(&mut self) -> StatusReceiver;
}

/// Uri for a file on the local filesystem.
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Local path behind a `file://` uri.
pub fn path_from_uri(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_uri_round_trip() {
        let path = Path::new("/data/vmemo/recordings/recording-1.wav");
        let uri = file_uri(path);
        assert_eq!(uri, "file:///data/vmemo/recordings/recording-1.wav");
        assert_eq!(path_from_uri(&uri).as_deref(), Some(path));
    }

    #[test]
    fn test_path_from_uri_rejects_other_schemes() {
        assert_eq!(path_from_uri("https://example.com/a.wav"), None);
        assert_eq!(path_from_uri("/plain/path.wav"), None);
        assert_eq!(path_from_uri("file://"), None);
    }
}
