//! Audio conversion module
//!
//! Batch conversion of audio files with ffmpeg: per-file descriptors, the
//! job that converts one file, and the orchestrator that runs a batch.

mod descriptor;
mod job;
mod orchestrator;
mod registry;
mod settings;

pub use descriptor::{apply_format_to_all, JobDescriptor, JobId, JobStatus};
pub use job::{ConversionJob, JobEvent, JobHandle, RUNNING_PROGRESS_CAP};
pub use orchestrator::{aggregate_progress, BatchHandle, BatchObserver, ConversionOrchestrator};
pub use registry::JobRegistry;
pub use settings::{output_path, BatchSettings};
