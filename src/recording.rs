//! Recording lifecycle. There can only be one active recording at a time.
//!
//! `Idle -> Recording -> PendingName -> Idle`. Stopping a recording leaves a
//! candidate note that is either committed under a name or discarded.

use std::cell::Cell;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};
use vmemo_audio::{AudioBackend, RecordingHandle};
use vmemo_core::{CandidateNote, Config, PermissionGate, RecorderState, VoiceNote};

use crate::event::MemoEvent;
use crate::task::TaskGuard;
use crate::{MemoError, Result};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

enum Session {
    Idle,
    Recording(ActiveRecording),
    PendingName(CandidateNote),
}

struct ActiveRecording {
    handle: Box<dyn RecordingHandle>,
    ticker: Ticker,
}

/// The once-per-second elapsed counter of a recording.
struct Ticker {
    elapsed: Rc<Cell<u64>>,
    _task: TaskGuard,
}

impl Ticker {
    fn start(events: UnboundedSender<MemoEvent>, max_duration: Option<Duration>) -> Self {
        let elapsed = Rc::new(Cell::new(0));
        let counter = elapsed.clone();
        let limit = max_duration.map(|d| d.as_secs());

        let task = TaskGuard::spawn_local(async move {
            let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            loop {
                interval.tick().await;
                let elapsed_secs = counter.get() + 1;
                counter.set(elapsed_secs);
                events.send(MemoEvent::RecordingTick { elapsed_secs }).ok();

                if limit == Some(elapsed_secs) {
                    info!(elapsed_secs, "Maximum recording duration reached");
                    events
                        .send(MemoEvent::MaxDurationReached { elapsed_secs })
                        .ok();
                }
            }
        });

        Self {
            elapsed,
            _task: task,
        }
    }

    fn elapsed_secs(&self) -> u64 {
        self.elapsed.get()
    }
}

/// Owns the single recording session.
///
/// Must be driven from inside a `tokio::task::LocalSet`; the tick runs as a
/// local task.
pub struct RecordingController {
    backend: Rc<dyn AudioBackend>,
    permission: Rc<dyn PermissionGate>,
    events: UnboundedSender<MemoEvent>,
    config: Config,
    session: Session,
}

impl RecordingController {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        permission: Rc<dyn PermissionGate>,
        events: UnboundedSender<MemoEvent>,
    ) -> Self {
        Self {
            backend,
            permission,
            events,
            config: Config::default(),
            session: Session::Idle,
        }
    }

    /// Apply the naming policy and maximum duration from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.config = config.clone();
        self
    }

    pub fn state(&self) -> RecorderState {
        match self.session {
            Session::Idle => RecorderState::Idle,
            Session::Recording(_) => RecorderState::Recording,
            Session::PendingName(_) => RecorderState::PendingName,
        }
    }

    /// Whole seconds recorded so far, 0 unless recording.
    pub fn elapsed_secs(&self) -> u64 {
        match &self.session {
            Session::Recording(active) => active.ticker.elapsed_secs(),
            _ => 0,
        }
    }

    /// The stopped recording waiting for a name, if any.
    pub fn candidate(&self) -> Option<&CandidateNote> {
        match &self.session {
            Session::PendingName(candidate) => Some(candidate),
            _ => None,
        }
    }

    /// Start recording. Starting while a candidate is pending discards it.
    pub async fn start(&mut self) -> Result<()> {
        if matches!(self.session, Session::Recording(_)) {
            warn!("Recording already in progress");
            return Err(MemoError::AlreadyRecording);
        }

        if !self.permission.microphone().is_granted() {
            warn!("Microphone permission denied");
            return Err(MemoError::PermissionDenied);
        }

        let handle = self.backend.create_recording().await.map_err(|e| {
            error!(backend = self.backend.name(), error = %e, "Failed to start recording");
            MemoError::Device(e)
        })?;

        let ticker = Ticker::start(self.events.clone(), self.config.max_duration());
        let previous = mem::replace(
            &mut self.session,
            Session::Recording(ActiveRecording { handle, ticker }),
        );
        if let Session::PendingName(candidate) = previous {
            info!(uri = %candidate.uri, "Discarding unsaved recording");
        }

        info!("Recording started");
        self.events.send(MemoEvent::RecordingStarted).ok();
        Ok(())
    }

    /// Stop the active recording and hold the result as a candidate.
    pub async fn stop(&mut self) -> Result<CandidateNote> {
        let ActiveRecording { mut handle, ticker } =
            match mem::replace(&mut self.session, Session::Idle) {
                Session::Recording(active) => active,
                other => {
                    self.session = other;
                    return Err(MemoError::NotRecording);
                }
            };

        let elapsed_secs = ticker.elapsed_secs();
        drop(ticker);

        let finished = handle.stop_and_finalize().await.map_err(|e| {
            error!(error = %e, "Failed to finalize recording");
            MemoError::Device(e)
        })?;

        let candidate = CandidateNote::from_millis(finished.uri, finished.duration_millis);
        info!(
            uri = %candidate.uri,
            duration_ms = finished.duration_millis,
            duration_secs = candidate.duration_secs,
            elapsed_secs,
            "Recording stopped"
        );
        self.events
            .send(MemoEvent::RecordingStopped {
                uri: candidate.uri.clone(),
                duration_secs: candidate.duration_secs,
            })
            .ok();

        self.session = Session::PendingName(candidate.clone());
        Ok(candidate)
    }

    /// Turn the pending candidate into a note named `name`.
    ///
    /// With the `reject` policy an empty name fails with
    /// [`MemoError::EmptyName`] and the candidate stays pending.
    pub fn commit(&mut self, name: &str) -> Result<VoiceNote> {
        let candidate = match mem::replace(&mut self.session, Session::Idle) {
            Session::PendingName(candidate) => candidate,
            other => {
                self.session = other;
                return Err(MemoError::NotRecording);
            }
        };

        match self.config.resolve_name(name) {
            Some(name) => Ok(candidate.into_note(name)),
            None => {
                debug!(uri = %candidate.uri, "Rejected empty name");
                self.session = Session::PendingName(candidate);
                Err(MemoError::EmptyName)
            }
        }
    }

    /// Drop the pending candidate without saving it.
    pub fn discard(&mut self) -> Option<CandidateNote> {
        match mem::replace(&mut self.session, Session::Idle) {
            Session::PendingName(candidate) => {
                info!(uri = %candidate.uri, "Discarded recording");
                Some(candidate)
            }
            other => {
                self.session = other;
                None
            }
        }
    }

    /// End whatever is in progress. An active recording is released without
    /// producing a candidate.
    pub fn shutdown(&mut self) {
        if let Session::Recording(_) = mem::replace(&mut self.session, Session::Idle) {
            info!("Recording abandoned on shutdown");
        }
    }
}
