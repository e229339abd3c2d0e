//! External encoder integration
//!
//! Locates ffmpeg, probes durations with ffprobe, builds command lines and
//! scans ffmpeg's output for progress markers.

mod command;
mod locator;
mod probe;
mod progress;

pub use command::{build_encoder_args, build_probe_args, channel_count};
pub use locator::{EncoderLocator, DEFAULT_ENCODER};
pub use probe::{MediaProbe, DURATION_UNKNOWN};
pub use progress::{parse_time_marker, progress_fraction, OutputLines};
