//! Persistence for the encoder path setting
//!
//! The only value this application persists is the location of the ffmpeg
//! binary. Storage is behind [`PathStore`] so the locator can be built over a
//! JSON file in the user's data directory or an in-memory store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::ConfigError;

/// Reads and writes the single persisted encoder path
pub trait PathStore: Send + Sync {
    /// Load the stored value, or `None` if it was never written
    fn load(&self) -> Result<Option<String>, ConfigError>;

    /// Persist the value for future sessions
    fn save(&self, value: &str) -> Result<(), ConfigError>;
}

/// On-disk layout of `settings.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(rename = "ffmpegPath", default, skip_serializing_if = "Option::is_none")]
    ffmpeg_path: Option<String>,
    /// Keys written by other versions are carried through untouched
    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

/// JSON file store
///
/// Persisted to `<data_dir>/Audio Batch Converter/settings.json`
#[derive(Debug, Clone)]
pub struct JsonPathStore {
    path: PathBuf,
}

impl JsonPathStore {
    const APP_DIR: &'static str = "Audio Batch Converter";
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Store in the platform's per-user data directory
    pub fn user_default() -> Result<Self, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(Self::at(data_dir.join(Self::APP_DIR).join(Self::SETTINGS_FILE)))
    }

    /// Store at an explicit file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<SettingsFile, ConfigError> {
        if !self.path.exists() {
            return Ok(SettingsFile::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl PathStore for JsonPathStore {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.read_file()?.ffmpeg_path)
    }

    fn save(&self, value: &str) -> Result<(), ConfigError> {
        let mut settings = self.read_file().unwrap_or_else(|e| {
            log::warn!("Discarding unreadable settings at {:?}: {}", self.path, e);
            SettingsFile::default()
        });
        settings.ffmpeg_path = Some(value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&self.path, json)?;

        log::debug!("Saved encoder path to {:?}", self.path);
        Ok(())
    }
}

/// In-process store, nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryPathStore {
    value: Mutex<Option<String>>,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl PathStore for MemoryPathStore {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, value: &str) -> Result<(), ConfigError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }
}
