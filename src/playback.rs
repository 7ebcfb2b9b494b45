//! Playback lifecycle. At most one clip is loaded at a time.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use vmemo_audio::{AudioBackend, AudioError, PlaybackHandle, PlaybackStatus, StatusReceiver};
use vmemo_core::{PlaybackProgress, PlaybackState, elapsed_secs, reported_secs};

use crate::event::MemoEvent;
use crate::task::TaskGuard;
use crate::{MemoError, Result};

struct ActivePlayback {
    // Distinguishes this session from any that came before it.
    id: u64,
    uri: String,
    handle: Box<dyn PlaybackHandle>,
    state: PlaybackState,
    position_secs: u64,
    duration_secs: u64,
}

impl ActivePlayback {
    fn progress(&self) -> PlaybackProgress {
        PlaybackProgress {
            uri: self.uri.clone(),
            state: self.state,
            position_secs: self.position_secs,
            duration_secs: self.duration_secs,
        }
    }

    fn release(mut self) {
        if let Err(e) = self.handle.stop() {
            warn!(uri = %self.uri, error = %e, "Failed to stop playback");
        }
    }
}

type SharedSession = Rc<RefCell<Option<ActivePlayback>>>;

/// Owns the single playback session.
///
/// Status updates are consumed by a local task, so the controller must be
/// driven from inside a `tokio::task::LocalSet`.
pub struct PlaybackController {
    backend: Rc<dyn AudioBackend>,
    events: UnboundedSender<MemoEvent>,
    session: SharedSession,
    listener: Option<TaskGuard>,
    next_id: u64,
}

impl PlaybackController {
    pub fn new(backend: Rc<dyn AudioBackend>, events: UnboundedSender<MemoEvent>) -> Self {
        Self {
            backend,
            events,
            session: Rc::new(RefCell::new(None)),
            listener: None,
            next_id: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.session
            .borrow()
            .as_ref()
            .map_or(PlaybackState::Idle, |active| active.state)
    }

    pub fn current_uri(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|active| active.uri.clone())
    }

    /// Whole seconds played, 0 when idle.
    pub fn position_secs(&self) -> u64 {
        self.session
            .borrow()
            .as_ref()
            .map_or(0, |active| active.position_secs)
    }

    pub fn progress(&self) -> Result<PlaybackProgress> {
        self.session
            .borrow()
            .as_ref()
            .map(ActivePlayback::progress)
            .ok_or(MemoError::NotPlaying)
    }

    /// Play `uri`, or stop it if it is the clip already active.
    ///
    /// Any other active clip is stopped and unloaded first. Returns the state
    /// the controller ends up in.
    pub async fn toggle(&mut self, uri: &str) -> Result<PlaybackState> {
        let same_uri = self.current_uri().as_deref() == Some(uri);
        self.stop();
        if same_uri {
            return Ok(PlaybackState::Idle);
        }

        let mut handle = self
            .backend
            .create_playback(uri)
            .await
            .map_err(|e| match e {
                AudioError::ResourceLoad { .. } => {
                    warn!(uri, error = %e, "Failed to load clip");
                    MemoError::ResourceLoad {
                        uri: uri.to_string(),
                        source: e,
                    }
                }
                other => {
                    error!(uri, error = %other, "Failed to open playback");
                    MemoError::Device(other)
                }
            })?;

        let duration_secs = reported_secs(handle.duration_millis());
        let status = handle.subscribe_status();
        self.next_id += 1;
        let id = self.next_id;

        *self.session.borrow_mut() = Some(ActivePlayback {
            id,
            uri: uri.to_string(),
            handle,
            state: PlaybackState::Loaded,
            position_secs: 0,
            duration_secs,
        });
        debug!(uri, duration_secs, "Clip loaded");

        self.listener = Some(TaskGuard::spawn_local(listen(
            id,
            self.session.clone(),
            self.events.clone(),
            status,
        )));

        let started = {
            let mut session = self.session.borrow_mut();
            match session.as_mut() {
                Some(active) => active.handle.play().map(|()| {
                    active.state = PlaybackState::Playing;
                }),
                None => Err(AudioError::Released),
            }
        };
        if let Err(e) = started {
            error!(uri, error = %e, "Failed to start playback");
            self.listener = None;
            if let Some(active) = self.session.borrow_mut().take() {
                active.release();
            }
            return Err(MemoError::Device(e));
        }

        info!(uri, duration_secs, "Playback started");
        self.events
            .send(MemoEvent::PlaybackStarted {
                uri: uri.to_string(),
                duration_secs,
            })
            .ok();
        Ok(PlaybackState::Playing)
    }

    /// Stop and unload the active clip. Returns false when nothing was
    /// loaded.
    pub fn stop(&mut self) -> bool {
        self.listener = None;
        let Some(active) = self.session.borrow_mut().take() else {
            return false;
        };

        let uri = active.uri.clone();
        active.release();
        info!(uri = %uri, "Playback stopped");
        self.events.send(MemoEvent::PlaybackStopped { uri }).ok();
        true
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.listener = None;
        if let Some(active) = self.session.borrow_mut().take() {
            active.release();
        }
    }
}

async fn listen(
    id: u64,
    session: SharedSession,
    events: UnboundedSender<MemoEvent>,
    mut status: StatusReceiver,
) {
    while let Some(update) = status.recv().await {
        match update {
            PlaybackStatus::Position { position_millis } => {
                let progress = {
                    let mut session = session.borrow_mut();
                    let Some(active) = session.as_mut().filter(|active| active.id == id) else {
                        break;
                    };
                    let position_secs = elapsed_secs(position_millis).min(active.duration_secs);
                    if position_secs == active.position_secs {
                        continue;
                    }
                    active.position_secs = position_secs;
                    active.progress()
                };
                events.send(MemoEvent::PlaybackProgress(progress)).ok();
            }
            PlaybackStatus::Finished => {
                let finished = {
                    let mut session = session.borrow_mut();
                    if session.as_ref().is_some_and(|active| active.id == id) {
                        session.take()
                    } else {
                        None
                    }
                };
                if let Some(active) = finished {
                    let uri = active.uri.clone();
                    active.release();
                    info!(uri = %uri, "Playback finished");
                    events.send(MemoEvent::PlaybackFinished { uri }).ok();
                }
                break;
            }
        }
    }
}
