//! Errors surfaced by the lifecycle controllers and the facade.

use thiserror::Error;
use vmemo_audio::AudioError;
use vmemo_store::StoreError;

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The recording or playback primitive failed
    #[error("audio device error: {0}")]
    Device(#[from] AudioError),

    #[error("failed to load {uri}")]
    ResourceLoad {
        uri: String,
        #[source]
        source: AudioError,
    },

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("nothing is playing")]
    NotPlaying,

    #[error("a recording needs a name")]
    EmptyName,

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl MemoError {
    /// Errors the user can act on directly, as opposed to device and storage
    /// failures that are only logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, MemoError::PermissionDenied | MemoError::EmptyName)
    }

    /// Calls made in the wrong lifecycle state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            MemoError::AlreadyRecording | MemoError::NotRecording | MemoError::NotPlaying
        )
    }

    /// Get a user-friendly description of the error
    pub fn user_message(&self) -> String {
        match self {
            MemoError::PermissionDenied => {
                "Microphone access is required to record. Please allow it in your settings."
                    .to_string()
            }
            MemoError::Device(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            MemoError::ResourceLoad { .. } => {
                "This recording could not be opened. It may have been moved or deleted."
                    .to_string()
            }
            MemoError::AlreadyRecording => "A recording is already in progress.".to_string(),
            MemoError::NotRecording => "There is no recording to stop or save.".to_string(),
            MemoError::NotPlaying => "Nothing is playing.".to_string(),
            MemoError::EmptyName => "Please enter a name for the recording.".to_string(),
            MemoError::Persistence(_) => "Your voice notes could not be saved.".to_string(),
        }
    }
}

/// Result type alias for vmemo operations
pub type Result<T> = std::result::Result<T, MemoError>;
