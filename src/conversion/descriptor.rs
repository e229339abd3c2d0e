//! Per-file job descriptors and their observable status
//!
//! A descriptor is owned by the caller (typically a UI table row) and shared
//! with the job converting it. Progress is stored as raw `f64` bits in an
//! atomic and status behind a short-lived lock, so rows can be rendered while
//! a job thread updates them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::audio::format_size;

/// Opaque identity of a descriptor, stable for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(uuid::Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a descriptor is in its conversion lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    /// Added to the batch, not started
    #[default]
    Pending,
    /// A job is running for this descriptor
    Converting,
    Success,
    /// Encoder exited non-zero (`None` when killed by a signal)
    Failed { exit_code: Option<i32> },
    Cancelled,
    /// Source already matches the requested format
    SkippedDuplicateFormat,
    /// A file already exists at the output path
    SkippedDuplicateOutput,
    EncoderNotConfigured,
    /// Launch or I/O failure while running
    Error { message: String },
}

impl JobStatus {
    /// Every state except `Pending` and `Converting` is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Converting)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            JobStatus::SkippedDuplicateFormat | JobStatus::SkippedDuplicateOutput
        )
    }

    /// Short label for display
    pub fn label(&self) -> String {
        match self {
            JobStatus::Pending => "Pending".to_string(),
            JobStatus::Converting => "Converting...".to_string(),
            JobStatus::Success => "Success".to_string(),
            JobStatus::Failed {
                exit_code: Some(code),
            } => format!("Failed (exit {})", code),
            JobStatus::Failed { exit_code: None } => "Failed".to_string(),
            JobStatus::Cancelled => "Cancelled".to_string(),
            JobStatus::SkippedDuplicateFormat => "Skipped (Duplicate format)".to_string(),
            JobStatus::SkippedDuplicateOutput => "Skipped (Output exists)".to_string(),
            JobStatus::EncoderNotConfigured => "FFmpeg not set".to_string(),
            JobStatus::Error { .. } => "Error".to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One file in a batch
#[derive(Debug)]
pub struct JobDescriptor {
    id: JobId,
    source_path: PathBuf,
    source_format: String,
    file_name: String,
    size_label: String,
    target_format: RwLock<Option<String>>,
    /// `f64` bits
    progress: AtomicU64,
    status: RwLock<JobStatus>,
    /// Bumped each time a run starts or the descriptor is settled
    run: AtomicU64,
}

/// Identifies one run of a job against its descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunToken(u64);

impl JobDescriptor {
    /// Create a descriptor with explicit metadata
    pub fn new(
        source_path: impl Into<PathBuf>,
        source_format: &str,
        size_label: impl Into<String>,
    ) -> Self {
        let source_path = source_path.into();
        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: JobId::new(),
            source_path,
            source_format: source_format.to_lowercase(),
            file_name,
            size_label: size_label.into(),
            target_format: RwLock::new(None),
            progress: AtomicU64::new(0f64.to_bits()),
            status: RwLock::new(JobStatus::Pending),
            run: AtomicU64::new(0),
        }
    }

    /// Create a descriptor for a file on disk
    ///
    /// Reads the file size and takes the format from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let absolute = std::path::absolute(path)?;
        let metadata = std::fs::metadata(&absolute)?;
        let format = absolute
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(absolute, &format, format_size(metadata.len())))
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Lowercase source extension
    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size_label(&self) -> &str {
        &self.size_label
    }

    /// Per-file target format override, if one was chosen
    pub fn target_format(&self) -> Option<String> {
        self.target_format
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_target_format(&self, format: Option<&str>) {
        *self
            .target_format
            .write()
            .unwrap_or_else(PoisonError::into_inner) = format.map(str::to_string);
    }

    /// Fraction complete in `[0.0, 1.0]`
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Acquire))
    }

    pub fn status(&self) -> JobStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Enter `Converting` with progress reset to zero
    ///
    /// Returns the token the running job must present for later updates.
    /// Starting a new run invalidates the tokens of earlier ones, so a job
    /// that is still winding down cannot overwrite its successor's state.
    pub(crate) fn begin(&self) -> RunToken {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let token = RunToken(self.run.fetch_add(1, Ordering::AcqRel) + 1);
        self.progress.store(0f64.to_bits(), Ordering::Release);
        *status = JobStatus::Converting;
        token
    }

    /// Raise progress to `value`; never lowers it
    ///
    /// Returns true if the stored value changed.
    pub(crate) fn advance_progress(&self, token: RunToken, value: f64) -> bool {
        let _status = self.status.read().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(token) {
            return false;
        }
        let value = value.clamp(0.0, 1.0);
        self.progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f64::from_bits(bits)).then_some(value.to_bits())
            })
            .is_ok()
    }

    /// Record the terminal status of a run
    ///
    /// Success pins progress to 1.0. Other outcomes keep the last value,
    /// dropped to 0.0 if it had reached 1.0. Returns false for a stale token.
    pub(crate) fn finish(&self, token: RunToken, status: JobStatus) -> bool {
        let mut current = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(token) {
            return false;
        }
        if status == JobStatus::Success {
            self.progress.store(1f64.to_bits(), Ordering::Release);
        } else if self.progress() >= 1.0 {
            self.progress.store(0f64.to_bits(), Ordering::Release);
        }
        *current = status;
        true
    }

    /// Record a status for a descriptor outside of any run
    ///
    /// Used for skips, launch failures and for queueing a descriptor again.
    /// Progress is reset to 0.0 and any earlier run is invalidated.
    pub(crate) fn settle(&self, status: JobStatus) {
        let mut current = self.status.write().unwrap_or_else(PoisonError::into_inner);
        self.run.fetch_add(1, Ordering::AcqRel);
        self.progress.store(0f64.to_bits(), Ordering::Release);
        *current = status;
    }

    fn is_current(&self, token: RunToken) -> bool {
        self.run.load(Ordering::Acquire) == token.0
    }
}

/// Set the same target format on every descriptor
pub fn apply_format_to_all(descriptors: &[std::sync::Arc<JobDescriptor>], format: &str) {
    for descriptor in descriptors {
        descriptor.set_target_format(Some(format));
    }
    log::info!(
        "Applied format .{} to {} file(s)",
        format,
        descriptors.len()
    );
}
