//! Core types and configuration for vmemo.
//!
//! This crate provides the platform-agnostic data model shared by the
//! store, the audio backends and the lifecycle controllers.

mod config;
mod note;
mod permission;
mod state;

pub use config::{Config, ConfigManager, EmptyNamePolicy, default_data_dir};
pub use note::{CandidateNote, VoiceNote, elapsed_secs, reported_secs};
pub use permission::{Permission, PermissionGate, StaticPermission};
pub use state::{PlaybackProgress, PlaybackState, RecorderState};

/// Application name
pub const APP_NAME: &str = "vmemo";

/// Key under which the voice-note collection is persisted.
pub const DEFAULT_STORAGE_KEY: &str = "@voice_notes";

/// Name given to recordings saved without one.
pub const DEFAULT_NOTE_NAME: &str = "Unnamed Recording";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
