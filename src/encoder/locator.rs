//! Resolves and persists the ffmpeg binary location

use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::PathStore;
use crate::error::ConversionError;

/// Bare executable name used when no path was ever configured (resolved via PATH)
pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Knows where the encoder lives
///
/// The stored value is loaded lazily on first use and cached; `set_path`
/// writes through to the store.
pub struct EncoderLocator {
    store: Arc<dyn PathStore>,
    cached: Mutex<Option<String>>,
}

impl EncoderLocator {
    pub fn new(store: Arc<dyn PathStore>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    /// The configured encoder path, or [`DEFAULT_ENCODER`] if never set
    ///
    /// An explicitly stored empty string is returned as-is and means the
    /// encoder is not configured.
    pub fn path(&self) -> String {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = cached.as_ref() {
            return path.clone();
        }

        let path = match self.store.load() {
            Ok(Some(path)) => path,
            Ok(None) => DEFAULT_ENCODER.to_string(),
            Err(e) => {
                log::warn!("Could not read encoder path, using default: {}", e);
                DEFAULT_ENCODER.to_string()
            }
        };
        *cached = Some(path.clone());
        path
    }

    /// Persist a new encoder path
    pub fn set_path(&self, path: &str) -> Result<(), crate::error::ConfigError> {
        self.store.save(path)?;
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
        log::info!("Encoder path set to {:?}", path);
        Ok(())
    }

    /// Whether a usable path is configured at all (not whether it runs)
    pub fn is_configured(&self) -> bool {
        !self.path().trim().is_empty()
    }

    /// Run `<encoder> -version` and report whether it exited cleanly
    ///
    /// Point-in-time check only. The binary may disappear before it is used.
    pub fn is_available(&self) -> bool {
        let path = self.path();
        if path.trim().is_empty() {
            return false;
        }

        match Command::new(&path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                log::debug!("Encoder at {:?} could not be started: {}", path, e);
                false
            }
        }
    }

    /// The configured path, if the encoder answers the version probe
    pub fn require_available(&self) -> Result<String, ConversionError> {
        if self.is_available() {
            Ok(self.path())
        } else {
            Err(ConversionError::EncoderNotConfigured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryPathStore;
    use crate::error::ConfigError;

    struct BrokenStore;

    impl PathStore for BrokenStore {
        fn load(&self) -> Result<Option<String>, ConfigError> {
            Err(ConfigError::NoDataDir)
        }

        fn save(&self, _value: &str) -> Result<(), ConfigError> {
            Err(ConfigError::NoDataDir)
        }
    }

    #[test]
    fn test_default_path_when_never_configured() {
        let locator = EncoderLocator::new(Arc::new(MemoryPathStore::new()));
        assert_eq!(locator.path(), "ffmpeg");
        assert!(locator.is_configured());
    }

    #[test]
    fn test_set_path_persists_through_store() {
        let store = Arc::new(MemoryPathStore::new());
        let locator = EncoderLocator::new(store.clone());
        locator.set_path("/opt/bin/ffmpeg").unwrap();

        assert_eq!(locator.path(), "/opt/bin/ffmpeg");
        assert_eq!(store.load().unwrap().as_deref(), Some("/opt/bin/ffmpeg"));

        // A new locator over the same store sees the value
        let other = EncoderLocator::new(store);
        assert_eq!(other.path(), "/opt/bin/ffmpeg");
    }

    #[test]
    fn test_empty_path_is_not_configured() {
        let locator = EncoderLocator::new(Arc::new(MemoryPathStore::with_value("")));
        assert!(!locator.is_configured());
        assert!(!locator.is_available());
        assert!(matches!(
            locator.require_available(),
            Err(ConversionError::EncoderNotConfigured)
        ));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let locator = EncoderLocator::new(Arc::new(MemoryPathStore::with_value(
            "/nonexistent/dir/ffmpeg",
        )));
        assert!(!locator.is_available());
    }

    #[test]
    fn test_store_failure_falls_back_to_default() {
        let locator = EncoderLocator::new(Arc::new(BrokenStore));
        assert_eq!(locator.path(), DEFAULT_ENCODER);
        assert!(locator.set_path("/x/ffmpeg").is_err());
        // Failed save leaves the cached value alone
        assert_eq!(locator.path(), DEFAULT_ENCODER);
    }

    #[cfg(unix)]
    #[test]
    fn test_available_only_on_zero_exit() {
        use crate::test_fixtures::write_script;
        let temp_dir = tempfile::TempDir::new().unwrap();

        let ok = write_script(temp_dir.path(), "ffmpeg-ok", "exit 0");
        let locator = EncoderLocator::new(Arc::new(MemoryPathStore::with_value(
            ok.to_string_lossy(),
        )));
        assert!(locator.is_available());

        let bad = write_script(temp_dir.path(), "ffmpeg-bad", "exit 3");
        let locator = EncoderLocator::new(Arc::new(MemoryPathStore::with_value(
            bad.to_string_lossy(),
        )));
        assert!(!locator.is_available());
    }
}
