//! Error types for conversion jobs and the settings store

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating or running a conversion job
#[derive(Error, Debug)]
pub enum ConversionError {
    /// No usable encoder path is configured
    #[error("FFmpeg is not configured. Please set the FFmpeg path.")]
    EncoderNotConfigured,

    /// The source is already in the requested target format
    #[error("File \"{file_name}\" is already in .{format} format.")]
    DuplicateTargetFormat { file_name: String, format: String },

    /// Converting would overwrite an existing file
    #[error("Output file already exists: {}", .0.display())]
    DuplicateOutputExists(PathBuf),

    /// The OS could not start the encoder
    #[error("Failed to spawn ffmpeg: {0}")]
    ProcessLaunch(#[source] std::io::Error),

    /// The encoder ran but reported failure
    #[error("ffmpeg exited with status {}", exit_label(.code))]
    NonZeroExit { code: Option<i32> },

    /// Duration probing failed; progress falls back to a fixed denominator
    #[error("ffprobe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

/// Errors raised by the persisted settings store
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to access settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}
