//! Scriptable in-memory backend for tests.
//!
//! Recordings produce `fake://` uris that become playable clips once
//! finalized. Tests drive playback by pushing status updates through
//! [`FakeAudioBackend::send_status`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    AudioBackend, AudioError, FinishedRecording, PlaybackHandle, PlaybackStatus, RecordingHandle,
    Result, StatusReceiver,
};

#[derive(Default)]
struct FakeState {
    next_id: u64,
    recording_millis: u64,
    fail_create_recording: Option<String>,
    fail_finalize: Option<String>,
    fail_play: Option<String>,
    clips: HashMap<String, u64>,
    active_recordings: usize,
    loaded: usize,
    loads: usize,
    playing: HashSet<String>,
    subscribers: HashMap<String, mpsc::UnboundedSender<PlaybackStatus>>,
}

/// Cloneable handle to the fake device. Clones share state, so a test keeps
/// one clone to script and inspect while the controller owns another.
#[derive(Clone, Default)]
pub struct FakeAudioBackend {
    state: Rc<RefCell<FakeState>>,
}

impl FakeAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length reported by every recording finalized from now on.
    pub fn set_recording_millis(&self, millis: u64) {
        self.state.borrow_mut().recording_millis = millis;
    }

    pub fn fail_next_recording(&self, reason: &str) {
        self.state.borrow_mut().fail_create_recording = Some(reason.to_string());
    }

    pub fn fail_next_finalize(&self, reason: &str) {
        self.state.borrow_mut().fail_finalize = Some(reason.to_string());
    }

    pub fn fail_next_play(&self, reason: &str) {
        self.state.borrow_mut().fail_play = Some(reason.to_string());
    }

    /// Make `uri` loadable with the given length.
    pub fn add_clip(&self, uri: &str, duration_millis: u64) {
        self.state
            .borrow_mut()
            .clips
            .insert(uri.to_string(), duration_millis);
    }

    /// Recording handles created and not yet finalized or dropped.
    pub fn active_recordings(&self) -> usize {
        self.state.borrow().active_recordings
    }

    /// Playback handles currently alive.
    pub fn loaded_clips(&self) -> usize {
        self.state.borrow().loaded
    }

    /// Total number of successful playback loads.
    pub fn load_count(&self) -> usize {
        self.state.borrow().loads
    }

    pub fn is_playing(&self, uri: &str) -> bool {
        self.state.borrow().playing.contains(uri)
    }

    /// Deliver a status update to the subscriber of `uri`. Returns false when
    /// nobody is listening.
    pub fn send_status(&self, uri: &str, status: PlaybackStatus) -> bool {
        let state = self.state.borrow();
        state
            .subscribers
            .get(uri)
            .is_some_and(|tx| tx.send(status).is_ok())
    }

    /// Report natural completion of `uri`.
    pub fn finish(&self, uri: &str) -> bool {
        self.send_status(uri, PlaybackStatus::Finished)
    }
}

#[async_trait(?Send)]
impl AudioBackend for FakeAudioBackend {
    async fn create_recording(&self) -> Result<Box<dyn RecordingHandle>> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_create_recording.take() {
            return Err(anyhow!(reason).into());
        }
        state.next_id += 1;
        state.active_recordings += 1;
        Ok(Box::new(FakeRecording {
            uri: format!("fake://recording-{}.wav", state.next_id),
            state: self.state.clone(),
            finalized: false,
        }))
    }

    async fn create_playback(&self, uri: &str) -> Result<Box<dyn PlaybackHandle>> {
        let mut state = self.state.borrow_mut();
        let Some(&duration_millis) = state.clips.get(uri) else {
            return Err(AudioError::resource_load(uri, "no such clip"));
        };
        state.loaded += 1;
        state.loads += 1;
        Ok(Box::new(FakePlayback {
            uri: uri.to_string(),
            duration_millis,
            state: self.state.clone(),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeRecording {
    uri: String,
    state: Rc<RefCell<FakeState>>,
    finalized: bool,
}

#[async_trait(?Send)]
impl RecordingHandle for FakeRecording {
    async fn stop_and_finalize(&mut self) -> Result<FinishedRecording> {
        if self.finalized {
            return Err(AudioError::Released);
        }
        self.finalized = true;

        let mut state = self.state.borrow_mut();
        state.active_recordings -= 1;
        if let Some(reason) = state.fail_finalize.take() {
            return Err(anyhow!(reason).into());
        }

        let duration_millis = state.recording_millis;
        state.clips.insert(self.uri.clone(), duration_millis);
        Ok(FinishedRecording {
            uri: self.uri.clone(),
            duration_millis,
        })
    }
}

impl Drop for FakeRecording {
    fn drop(&mut self) {
        if !self.finalized {
            self.state.borrow_mut().active_recordings -= 1;
        }
    }
}

struct FakePlayback {
    uri: String,
    duration_millis: u64,
    state: Rc<RefCell<FakeState>>,
}

impl PlaybackHandle for FakePlayback {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn duration_millis(&self) -> u64 {
        self.duration_millis
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_play.take() {
            return Err(anyhow!(reason).into());
        }
        state.playing.insert(self.uri.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state.borrow_mut().playing.remove(&self.uri);
        Ok(())
    }

    fn subscribe_status(&mut self) -> StatusReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .borrow_mut()
            .subscribers
            .insert(self.uri.clone(), tx);
        rx
    }
}

impl Drop for FakePlayback {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.loaded -= 1;
        state.playing.remove(&self.uri);
        state.subscribers.remove(&self.uri);
    }
}
