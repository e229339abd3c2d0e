//! Audio Batch Converter
//!
//! Converts batches of audio files between MP3, WAV, M4A and FLAC by driving
//! an external ffmpeg, with per-file and aggregate progress, cancellation
//! and duplicate detection.

pub mod audio;
pub mod config;
pub mod conversion;
pub mod encoder;
pub mod error;
pub mod logging;

#[cfg(test)]
mod test_fixtures;

pub use config::{JsonPathStore, MemoryPathStore, PathStore};
pub use conversion::{
    BatchHandle, BatchObserver, BatchSettings, ConversionOrchestrator, JobDescriptor, JobStatus,
};
pub use encoder::{EncoderLocator, MediaProbe};
pub use error::{ConfigError, ConversionError};
