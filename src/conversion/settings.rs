//! Batch-wide conversion settings

use std::path::{Path, PathBuf};

use super::JobDescriptor;

/// Settings shared by every job in one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Audio bitrate passed to `-b:a`, e.g. `192k`
    pub bitrate: Option<String>,
    /// Sample rate passed to `-ar`, e.g. `44100`
    pub sample_rate: Option<String>,
    /// Channel label; "Mono" selects one channel, anything else two
    pub channels: Option<String>,
    pub output_dir: PathBuf,
    /// Used for descriptors without a per-file target format
    pub default_format: String,
}

impl BatchSettings {
    pub fn new(output_dir: impl Into<PathBuf>, default_format: &str) -> Self {
        Self {
            bitrate: None,
            sample_rate: None,
            channels: None,
            output_dir: output_dir.into(),
            default_format: default_format.to_string(),
        }
    }

    pub fn with_bitrate(mut self, bitrate: &str) -> Self {
        self.bitrate = Some(bitrate.to_string());
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: &str) -> Self {
        self.sample_rate = Some(sample_rate.to_string());
        self
    }

    pub fn with_channels(mut self, channels: &str) -> Self {
        self.channels = Some(channels.to_string());
        self
    }

    /// Apply display labels as shown in a settings panel
    ///
    /// `"192 kbps"` becomes `192k`, `"44100 Hz"` becomes `44100`. Values
    /// already in encoder form pass through unchanged.
    pub fn with_labels(mut self, bitrate: &str, sample_rate: &str, channels: &str) -> Self {
        self.bitrate = Some(bitrate.replace(" kbps", "k").trim().to_string());
        self.sample_rate = Some(sample_rate.replace(" Hz", "").trim().to_string());
        self.channels = Some(channels.trim().to_string());
        self
    }

    /// Per-file override if set and non-blank, else the batch default
    pub fn effective_format(&self, descriptor: &JobDescriptor) -> String {
        descriptor
            .target_format()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| self.default_format.clone())
    }

    /// Where `source` lands when converted to `format`
    pub fn output_path(&self, source: &Path, format: &str) -> PathBuf {
        output_path(&self.output_dir, source, format)
    }
}

/// Output directory joined with the source stem and the new extension
pub fn output_path(output_dir: &Path, source: &Path, format: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.{}", stem, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_replaces_extension() {
        assert_eq!(
            output_path(Path::new("/out"), Path::new("/music/song.mp3"), "wav"),
            PathBuf::from("/out/song.wav")
        );
    }

    #[test]
    fn test_output_path_strips_only_last_extension() {
        assert_eq!(
            output_path(Path::new("/out"), Path::new("/music/live.2019.flac"), "m4a"),
            PathBuf::from("/out/live.2019.m4a")
        );
    }

    #[test]
    fn test_output_path_without_extension() {
        assert_eq!(
            output_path(Path::new("/out"), Path::new("/music/track"), "mp3"),
            PathBuf::from("/out/track.mp3")
        );
    }

    #[test]
    fn test_effective_format_prefers_override() {
        let settings = BatchSettings::new("/out", "mp3");
        let d = JobDescriptor::new("/a.flac", "flac", "");
        assert_eq!(settings.effective_format(&d), "mp3");

        d.set_target_format(Some("wav"));
        assert_eq!(settings.effective_format(&d), "wav");

        d.set_target_format(Some("   "));
        assert_eq!(settings.effective_format(&d), "mp3");
    }

    #[test]
    fn test_labels_are_normalized() {
        let settings = BatchSettings::new("/out", "mp3").with_labels("192 kbps", "44100 Hz", "Mono");
        assert_eq!(settings.bitrate.as_deref(), Some("192k"));
        assert_eq!(settings.sample_rate.as_deref(), Some("44100"));
        assert_eq!(settings.channels.as_deref(), Some("Mono"));

        let raw = BatchSettings::new("/out", "mp3").with_labels("320k", "48000", "Stereo");
        assert_eq!(raw.bitrate.as_deref(), Some("320k"));
        assert_eq!(raw.sample_rate.as_deref(), Some("48000"));
    }
}
