//! A single file conversion
//!
//! Each [`ConversionJob`] runs ffmpeg for one descriptor on its own thread,
//! scans the merged stdout/stderr stream for `time=` markers, and reports
//! progress and its final outcome over a channel.
//!
//! Cancellation is cooperative: [`JobHandle::cancel`] sets a flag and (on
//! unix) SIGKILLs the running ffmpeg so a blocked read returns promptly. The
//! job observes the flag at the next loop iteration and finishes as
//! `Cancelled` without waiting for ffmpeg to exit on its own.

use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::descriptor::RunToken;
use super::{BatchSettings, JobDescriptor, JobId, JobStatus};
use crate::encoder::{
    build_encoder_args, parse_time_marker, progress_fraction, EncoderLocator, MediaProbe,
    OutputLines,
};
use crate::error::ConversionError;

/// Highest progress a job reports while still converting
///
/// 1.0 is reserved for `Success`.
pub const RUNNING_PROGRESS_CAP: f64 = 0.99;

/// How long the read loop blocks before re-checking for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Events emitted by a running job
#[derive(Debug)]
pub enum JobEvent {
    /// The descriptor's progress increased
    Progress { id: JobId, progress: f64 },
    /// The job reached a terminal state
    ///
    /// `Err` carries launch and I/O failures; the descriptor is already
    /// marked `Error` when this is sent.
    Finished {
        id: JobId,
        outcome: Result<JobStatus, ConversionError>,
    },
}

/// Cancellation handle shared between a job and its owner
#[derive(Debug, Default)]
pub struct JobHandle {
    cancelled: AtomicBool,
    /// PID of the running ffmpeg process (for instant termination)
    pid: Mutex<Option<u32>>,
    /// Set once the job thread is gone and its partial output removed
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

impl JobHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; repeated calls are no-ops
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Kill under the lock so the job cannot reap the PID in between
        let pid = self.pid.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pid) = *pid {
            kill_pid(pid);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the job has ended, cleanup included
    pub fn is_finished(&self) -> bool {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the job has ended, cleanup included
    pub fn wait_finished(&self) {
        let mut finished = self.finished.lock().unwrap_or_else(PoisonError::into_inner);
        while !*finished {
            finished = self
                .finished_cv
                .wait(finished)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn mark_finished(&self) {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.finished_cv.notify_all();
    }

    #[cfg(all(test, unix))]
    fn running_pid(&self) -> Option<u32> {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the running process; kills it straight away if cancelled already
    fn attach(&self, pid: u32) {
        let mut current = self.pid.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Some(pid);
        if self.is_cancelled() {
            kill_pid(pid);
        }
    }

    /// Forget the PID; must happen before the child is reaped
    fn detach(&self) {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Marks the handle finished when dropped, even if the job thread never ran
struct FinishGuard(Arc<JobHandle>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    // SIGKILL for immediate termination
    unsafe {
        libc::kill(pid as i32, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_pid(_pid: u32) {
    // Without a portable kill-by-PID the job thread kills its own child
    // once it sees the flag.
}

/// Converts one descriptor to one target format
pub struct ConversionJob {
    descriptor: Arc<JobDescriptor>,
    target_format: String,
    settings: Arc<BatchSettings>,
    locator: Arc<EncoderLocator>,
    probe: Arc<MediaProbe>,
    handle: Arc<JobHandle>,
    events: Sender<JobEvent>,
}

impl ConversionJob {
    pub fn new(
        descriptor: Arc<JobDescriptor>,
        target_format: &str,
        settings: Arc<BatchSettings>,
        locator: Arc<EncoderLocator>,
        probe: Arc<MediaProbe>,
        events: Sender<JobEvent>,
    ) -> Self {
        Self {
            descriptor,
            target_format: target_format.to_string(),
            settings,
            locator,
            probe,
            handle: Arc::new(JobHandle::new()),
            events,
        }
    }

    pub fn id(&self) -> JobId {
        self.descriptor.id()
    }

    pub fn descriptor(&self) -> &Arc<JobDescriptor> {
        &self.descriptor
    }

    pub fn handle(&self) -> Arc<JobHandle> {
        self.handle.clone()
    }

    pub fn output_path(&self) -> PathBuf {
        self.settings
            .output_path(self.descriptor.source_path(), &self.target_format)
    }

    /// Run on a dedicated thread, sending `Finished` when done
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        let finished = FinishGuard(self.handle.clone());
        thread::Builder::new()
            .name(format!("convert-{}", self.descriptor.file_name()))
            .spawn(move || {
                let _finished = finished;
                let outcome = self.run();
                let _ = self.events.send(JobEvent::Finished {
                    id: self.id(),
                    outcome,
                });
            })
    }

    /// Convert the file, blocking the calling thread until a terminal state
    ///
    /// The descriptor's status is updated before this returns. Launch and
    /// I/O failures mark it `Error` and are returned as `Err`.
    pub fn run(&self) -> Result<JobStatus, ConversionError> {
        let run = self.descriptor.begin();
        let _ = self.events.send(JobEvent::Progress {
            id: self.id(),
            progress: 0.0,
        });

        let outcome = self.execute(run);
        let status = match &outcome {
            Ok(status) => status.clone(),
            Err(e) => JobStatus::Error {
                message: e.to_string(),
            },
        };

        if !self.descriptor.finish(run, status.clone()) {
            log::debug!(
                "{}: superseded by a newer run, dropping {}",
                self.descriptor.file_name(),
                status
            );
        }

        match &outcome {
            Ok(JobStatus::Success) => log::info!("Converted: {}", self.descriptor.file_name()),
            Ok(status) => log::info!("{}: {}", self.descriptor.file_name(), status),
            Err(e) => log::error!("{}: {}", self.descriptor.file_name(), e),
        }
        outcome
    }

    fn execute(&self, run: RunToken) -> Result<JobStatus, ConversionError> {
        if self.handle.is_cancelled() {
            return Ok(JobStatus::Cancelled);
        }

        let encoder = self.locator.path();
        if encoder.trim().is_empty() {
            return Ok(JobStatus::EncoderNotConfigured);
        }

        let input = self.descriptor.source_path();
        let output = self.output_path();

        let probed = self.probe.duration_seconds(input);
        let duration = if probed > 0.0 {
            probed
        } else {
            log::warn!(
                "Unknown duration for {}, progress will be approximate",
                self.descriptor.file_name()
            );
            1.0
        };

        if !self.settings.output_dir.exists() {
            std::fs::create_dir_all(&self.settings.output_dir)?;
        }

        let args = build_encoder_args(input, &output, &self.target_format, &self.settings);
        log::info!(
            "Converting: {} -> {}",
            input.display(),
            output.display()
        );

        let mut child = Command::new(&encoder)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ConversionError::ProcessLaunch)?;
        self.handle.attach(child.id());

        let lines = merge_output(&mut child);

        loop {
            if self.handle.is_cancelled() {
                return self.abort(&mut child, &output);
            }

            match lines.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(line)) => self.handle_line(run, &line, duration),
                Ok(Err(e)) => {
                    self.handle.detach();
                    terminate(&mut child);
                    return Err(e.into());
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if self.handle.is_cancelled() {
            return self.abort(&mut child, &output);
        }

        self.handle.detach();
        let status = child.wait()?;

        if status.success() {
            Ok(JobStatus::Success)
        } else if self.handle.is_cancelled() {
            // Killed while we were waiting
            remove_partial(&output);
            Ok(JobStatus::Cancelled)
        } else {
            remove_partial(&output);
            log::warn!(
                "{}: {}",
                self.descriptor.file_name(),
                ConversionError::NonZeroExit {
                    code: status.code()
                }
            );
            Ok(JobStatus::Failed {
                exit_code: status.code(),
            })
        }
    }

    fn handle_line(&self, run: RunToken, line: &str, duration: f64) {
        match parse_time_marker(line) {
            Some(elapsed) => {
                let progress = progress_fraction(elapsed, duration).min(RUNNING_PROGRESS_CAP);
                if self.descriptor.advance_progress(run, progress) {
                    let _ = self.events.send(JobEvent::Progress {
                        id: self.id(),
                        progress,
                    });
                }
            }
            None => log::debug!("[ffmpeg] {}", line),
        }
    }

    fn abort(&self, child: &mut Child, output: &Path) -> Result<JobStatus, ConversionError> {
        self.handle.detach();
        terminate(child);
        remove_partial(output);
        Ok(JobStatus::Cancelled)
    }
}

/// Kill and reap the child; errors mean it already exited
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Delete a partially written output file
fn remove_partial(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            log::warn!("Failed to remove partial output {}: {}", output.display(), e);
        }
    }
}

/// Merge the child's stdout and stderr into one stream of lines
///
/// Each pipe is drained on its own thread. The receiver disconnects once
/// both pipes reach EOF.
fn merge_output(child: &mut Child) -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, tx);
    }
    rx
}

fn forward_lines<R: Read + Send + 'static>(stream: R, tx: Sender<io::Result<String>>) {
    thread::spawn(move || {
        for line in OutputLines::new(BufReader::new(stream)) {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
}
