//! Media duration lookup through ffprobe

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use super::EncoderLocator;
use super::command::build_probe_args;
use crate::error::ConversionError;

/// Returned by [`MediaProbe::duration_seconds`] when the duration is unknown
pub const DURATION_UNKNOWN: f64 = -1.0;

#[cfg(windows)]
const PROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(windows))]
const PROBE_BINARY: &str = "ffprobe";

/// Asks ffprobe for a file's duration
///
/// ffprobe is expected next to the configured ffmpeg binary. When ffmpeg is
/// configured as a bare name (PATH lookup), ffprobe is looked up the same way.
pub struct MediaProbe {
    locator: Arc<EncoderLocator>,
}

impl MediaProbe {
    pub fn new(locator: Arc<EncoderLocator>) -> Self {
        Self { locator }
    }

    /// Path of the probe binary derived from the encoder location
    pub fn probe_path(&self) -> Result<PathBuf, ConversionError> {
        let encoder = self.locator.path();
        if encoder.trim().is_empty() {
            return Err(ConversionError::ProbeUnavailable(
                "encoder path is not configured".to_string(),
            ));
        }

        match Path::new(&encoder).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                let probe = dir.join(PROBE_BINARY);
                if probe.exists() {
                    Ok(probe)
                } else {
                    Err(ConversionError::ProbeUnavailable(format!(
                        "{} not found in same folder as ffmpeg",
                        PROBE_BINARY
                    )))
                }
            }
            _ => Ok(PathBuf::from(PROBE_BINARY)),
        }
    }

    /// Duration of `input` in seconds
    pub fn try_duration_seconds(&self, input: &Path) -> Result<f64, ConversionError> {
        if !input.exists() {
            return Err(ConversionError::ProbeUnavailable(format!(
                "input does not exist: {}",
                input.display()
            )));
        }

        let probe = self.probe_path()?;
        let output = Command::new(&probe)
            .args(build_probe_args(input))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ConversionError::ProbeUnavailable(format!("failed to run ffprobe: {}", e)))?;

        // ffprobe errors land on stderr; treat both streams as one
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        parse_duration(&text).ok_or_else(|| {
            ConversionError::ProbeUnavailable(format!(
                "unparseable duration for {}: {:?}",
                input.display(),
                text.lines().next().unwrap_or("")
            ))
        })
    }

    /// Duration of `input` in seconds, or [`DURATION_UNKNOWN`] on any failure
    pub fn duration_seconds(&self, input: &Path) -> f64 {
        match self.try_duration_seconds(input) {
            Ok(seconds) => seconds,
            Err(e) => {
                log::warn!("Failed to get duration for {}: {}", input.display(), e);
                DURATION_UNKNOWN
            }
        }
    }
}

/// Parse the first line of ffprobe output as seconds
fn parse_duration(output: &str) -> Option<f64> {
    let first = output.lines().next()?.trim();
    if first.is_empty() {
        return None;
    }
    first.parse::<f64>().ok().filter(|secs| secs.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryPathStore;
    use tempfile::TempDir;

    fn probe_for(encoder: &str) -> MediaProbe {
        let locator = EncoderLocator::new(Arc::new(MemoryPathStore::with_value(encoder)));
        MediaProbe::new(Arc::new(locator))
    }

    #[test]
    fn test_parse_duration_first_line() {
        assert_eq!(parse_duration("183.240000\n"), Some(183.24));
        assert_eq!(parse_duration("  12.5  \nextra"), Some(12.5));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration("\n12.0"), None);
        assert_eq!(parse_duration("song.txt: Invalid data found when processing input"), None);
    }

    #[test]
    fn test_bare_encoder_name_uses_bare_probe_name() {
        let probe = probe_for("ffmpeg");
        assert_eq!(probe.probe_path().unwrap(), PathBuf::from(PROBE_BINARY));
    }

    #[test]
    fn test_missing_sibling_probe_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let encoder = temp_dir.path().join("ffmpeg");
        let probe = probe_for(&encoder.to_string_lossy());

        assert!(matches!(
            probe.probe_path(),
            Err(ConversionError::ProbeUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_input_returns_sentinel() {
        let probe = probe_for("ffmpeg");
        let secs = probe.duration_seconds(Path::new("/nonexistent/input.mp3"));
        assert_eq!(secs, DURATION_UNKNOWN);
    }

    #[test]
    fn test_missing_probe_returns_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("song.mp3");
        std::fs::write(&input, b"fake").unwrap();
        let probe = probe_for(&temp_dir.path().join("ffmpeg").to_string_lossy());

        assert_eq!(probe.duration_seconds(&input), DURATION_UNKNOWN);
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_duration_from_sibling_probe() {
        use crate::test_fixtures::{fake_encoder, fake_probe, ENCODE_OK};

        let temp_dir = TempDir::new().unwrap();
        let encoder = fake_encoder(temp_dir.path(), ENCODE_OK);
        fake_probe(temp_dir.path(), "42.500000");
        let input = temp_dir.path().join("song.mp3");
        std::fs::write(&input, b"fake").unwrap();

        let probe = probe_for(&encoder.to_string_lossy());
        assert_eq!(probe.duration_seconds(&input), 42.5);
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_probe_output_returns_sentinel() {
        use crate::test_fixtures::{fake_encoder, fake_probe, ENCODE_OK};

        let temp_dir = TempDir::new().unwrap();
        let encoder = fake_encoder(temp_dir.path(), ENCODE_OK);
        fake_probe(temp_dir.path(), "N/A");
        let input = temp_dir.path().join("notes.txt");
        std::fs::write(&input, b"not audio").unwrap();

        let probe = probe_for(&encoder.to_string_lossy());
        assert_eq!(probe.duration_seconds(&input), DURATION_UNKNOWN);
    }
}
