//! Configuration management for vmemo.
//!
//! This module provides configuration that doesn't depend on any particular
//! audio backend or persistence slot.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::{config_dir, data_local_dir};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{APP_NAME, DEFAULT_NOTE_NAME, DEFAULT_STORAGE_KEY};

/// What to do when a recording is saved with an empty name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyNamePolicy {
    /// Save under the configured fallback name
    #[default]
    Fallback,
    /// Refuse to save until a name is given
    Reject,
}

impl EmptyNamePolicy {
    /// Resolve the name a note should be saved under, or `None` if the policy
    /// refuses it.
    pub fn resolve(self, name: &str, fallback: &str) -> Option<String> {
        let name = name.trim();
        match (name.is_empty(), self) {
            (false, _) => Some(name.to_string()),
            (true, EmptyNamePolicy::Fallback) => Some(fallback.to_string()),
            (true, EmptyNamePolicy::Reject) => None,
        }
    }
}

/// Returns the default data directory for vmemo.
///
/// This is where the persisted note list and recordings are stored.
pub fn default_data_dir() -> Result<PathBuf> {
    let data_dir = data_local_dir().context("Failed to get data local directory")?;
    Ok(data_dir.join(APP_NAME))
}

/// Configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Key the note collection is persisted under
    #[serde(
        default = "default_storage_key",
        skip_serializing_if = "is_default_storage_key"
    )]
    pub storage_key: String,

    /// Directory for the persisted note list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Directory new recordings are written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recordings_dir: Option<PathBuf>,

    /// Policy for saving a recording without a name
    #[serde(default, skip_serializing_if = "is_default_policy")]
    pub empty_name: EmptyNamePolicy,

    /// Name used by the `fallback` policy
    #[serde(
        default = "default_fallback_name",
        skip_serializing_if = "is_default_fallback_name"
    )]
    pub fallback_name: String,

    /// Notify once a recording reaches this many seconds. 0 means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u64>,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn is_default_storage_key(v: &str) -> bool {
    v == DEFAULT_STORAGE_KEY
}

fn is_default_policy(v: &EmptyNamePolicy) -> bool {
    *v == EmptyNamePolicy::default()
}

fn default_fallback_name() -> String {
    DEFAULT_NOTE_NAME.to_string()
}

fn is_default_fallback_name(v: &str) -> bool {
    v == DEFAULT_NOTE_NAME
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            data_dir: None,
            recordings_dir: None,
            empty_name: EmptyNamePolicy::default(),
            fallback_name: default_fallback_name(),
            max_duration: None,
        }
    }
}

impl Config {
    /// Get the storage key
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Directory for the persisted note list, falling back to the platform
    /// data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    /// Directory recordings are written to, `<data_dir>/recordings` unless
    /// overridden.
    pub fn recordings_dir(&self) -> Result<PathBuf> {
        match &self.recordings_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("recordings")),
        }
    }

    /// Resolve the name a note should be saved under.
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        self.empty_name.resolve(name, &self.fallback_name)
    }

    /// Get the maximum recording duration as a Duration, `None` when unset
    /// or 0.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            debug!(path = ?self.config_path, "No config file, using defaults");
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
