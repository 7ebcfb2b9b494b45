//! The voice memo facade.

use std::rc::Rc;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};
use vmemo_audio::{AudioBackend, CpalBackend};
use vmemo_core::{
    CandidateNote, Config, PermissionGate, PlaybackProgress, PlaybackState, RecorderState,
    StaticPermission, VoiceNote,
};
use vmemo_store::{FileSlot, KeyValueSlot, VoiceNoteStore, filter_by_name};

use crate::event::MemoEvent;
use crate::playback::PlaybackController;
use crate::recording::RecordingController;
use crate::Result;

/// Records, lists, plays back and deletes voice notes.
///
/// Owns the in-memory note list, both lifecycle controllers and the store.
/// The list is what callers see; every change is written through to the
/// store, and a failed write is logged without rolling the list back.
///
/// Like the controllers, the facade must be driven from inside a
/// `tokio::task::LocalSet`.
pub struct VoiceMemos {
    config: Config,
    store: VoiceNoteStore,
    notes: Vec<VoiceNote>,
    recorder: RecordingController,
    player: PlaybackController,
    events: UnboundedSender<MemoEvent>,
}

impl VoiceMemos {
    /// Load the persisted notes and set up the controllers. A list that
    /// fails to load is logged and the facade starts empty.
    pub async fn open(
        config: Config,
        slot: Arc<dyn KeyValueSlot>,
        backend: Rc<dyn AudioBackend>,
        permission: Rc<dyn PermissionGate>,
    ) -> (Self, UnboundedReceiver<MemoEvent>) {
        let (events, rx) = mpsc::unbounded_channel();

        if !permission.microphone().is_granted() {
            warn!("Microphone permission not granted, recording will fail");
        }

        let store = VoiceNoteStore::new(slot.clone(), config.storage_key());
        let notes = match store.load_all().await {
            Ok(notes) => notes,
            Err(e) => {
                error!(slot = slot.name(), key = store.key(), error = %e, "Failed to load notes");
                Vec::new()
            }
        };
        info!(
            slot = slot.name(),
            backend = backend.name(),
            count = notes.len(),
            "Opened voice memos"
        );

        let recorder = RecordingController::new(backend.clone(), permission, events.clone())
            .with_config(&config);
        let player = PlaybackController::new(backend, events.clone());

        let memos = Self {
            config,
            store,
            notes,
            recorder,
            player,
            events,
        };
        (memos, rx)
    }

    /// Open with the file store in the data directory, the cpal backend
    /// recording into the recordings directory and microphone access
    /// assumed granted.
    pub async fn open_default(
        config: Config,
    ) -> anyhow::Result<(Self, UnboundedReceiver<MemoEvent>)> {
        let data_dir = config.data_dir()?;
        let recordings_dir = config.recordings_dir()?;
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let slot: Arc<dyn KeyValueSlot> = Arc::new(FileSlot::new(data_dir));
        let backend: Rc<dyn AudioBackend> = Rc::new(CpalBackend::new(recordings_dir));
        Ok(Self::open(config, slot, backend, Rc::new(StaticPermission::granted())).await)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All notes in insertion order.
    pub fn notes(&self) -> &[VoiceNote] {
        &self.notes
    }

    pub fn get(&self, uri: &str) -> Option<&VoiceNote> {
        self.notes.iter().find(|note| note.uri == uri)
    }

    /// Notes whose name contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<VoiceNote> {
        filter_by_name(&self.notes, query)
    }

    /// Replace the in-memory list with what is persisted. On failure the
    /// current list is kept.
    pub async fn reload(&mut self) -> Result<usize> {
        self.notes = self.store.load_all().await?;
        self.notes_changed();
        Ok(self.notes.len())
    }

    pub fn recording_state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.recorder.elapsed_secs()
    }

    pub fn candidate(&self) -> Option<&CandidateNote> {
        self.recorder.candidate()
    }

    pub async fn start_recording(&mut self) -> Result<()> {
        self.recorder.start().await
    }

    pub async fn stop_recording(&mut self) -> Result<CandidateNote> {
        self.recorder.stop().await
    }

    /// Save the pending recording under `name` and append it to the list.
    pub async fn commit_recording(&mut self, name: &str) -> Result<VoiceNote> {
        let note = self.recorder.commit(name)?;

        self.notes.retain(|n| n.uri != note.uri);
        self.notes.push(note.clone());
        if let Err(e) = self.store.append(note.clone()).await {
            error!(uri = %note.uri, error = %e, "Failed to persist note");
        }

        self.notes_changed();
        Ok(note)
    }

    pub fn discard_recording(&mut self) -> Option<CandidateNote> {
        self.recorder.discard()
    }

    /// Play `uri`, or stop it if it is already playing.
    pub async fn toggle_playback(&mut self, uri: &str) -> Result<PlaybackState> {
        self.player.toggle(uri).await
    }

    pub fn stop_playback(&mut self) -> bool {
        self.player.stop()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn playback(&self) -> Result<PlaybackProgress> {
        self.player.progress()
    }

    /// Delete the note with `uri`, stopping its playback first. Returns
    /// whether a note was removed.
    pub async fn delete(&mut self, uri: &str) -> bool {
        if self.player.current_uri().as_deref() == Some(uri) {
            self.player.stop();
        }

        let before = self.notes.len();
        self.notes.retain(|note| note.uri != uri);
        let mut removed = self.notes.len() != before;

        match self.store.delete_by_uri(uri).await {
            Ok(persisted) => removed |= persisted,
            Err(e) => error!(uri, error = %e, "Failed to delete persisted note"),
        }

        if removed {
            self.notes_changed();
        }
        removed
    }

    /// Stop playback and abandon any recording in progress.
    pub fn shutdown(&mut self) {
        self.player.stop();
        self.recorder.shutdown();
        info!("Voice memos shut down");
    }

    fn notes_changed(&self) {
        self.events
            .send(MemoEvent::NotesChanged {
                count: self.notes.len(),
            })
            .ok();
    }
}
