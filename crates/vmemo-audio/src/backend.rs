use std::cell::Cell;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use cpal::Host;
use tracing::debug;

use crate::play::CpalPlayback;
use crate::record::CpalRecording;
use crate::{AudioBackend, PlaybackHandle, RecordingHandle, Result};

/// Hardware backend on the default cpal host. Recordings are WAV files in
/// `recordings_dir`, addressed by `file://` uris.
pub struct CpalBackend {
    host: Host,
    recordings_dir: PathBuf,
    sequence: Cell<u64>,
}

impl CpalBackend {
    pub fn new(recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: cpal::default_host(),
            recordings_dir: recordings_dir.into(),
            sequence: Cell::new(0),
        }
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    fn next_recording_path(&self) -> PathBuf {
        let sequence = self.sequence.get() + 1;
        self.sequence.set(sequence);
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f").to_string();
        recording_path(&self.recordings_dir, &stamp, sequence)
    }
}

fn recording_path(dir: &Path, stamp: &str, sequence: u64) -> PathBuf {
    dir.join(format!("recording-{}-{}.wav", stamp, sequence))
}

#[async_trait(?Send)]
impl AudioBackend for CpalBackend {
    async fn create_recording(&self) -> Result<Box<dyn RecordingHandle>> {
        tokio::fs::create_dir_all(&self.recordings_dir).await?;
        let path = self.next_recording_path();
        debug!(path = ?path, "Creating recording");
        Ok(Box::new(CpalRecording::start(&self.host, path)?))
    }

    async fn create_playback(&self, uri: &str) -> Result<Box<dyn PlaybackHandle>> {
        Ok(Box::new(CpalPlayback::load(&self.host, uri)?))
    }

    fn name(&self) -> &str {
        "cpal"
    }
}
