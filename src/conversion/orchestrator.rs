//! Batch orchestration
//!
//! [`ConversionOrchestrator`] validates a batch, launches one thread per
//! convertible file and folds job events into an aggregate progress figure.
//!
//! Job threads report over an mpsc channel to a per-batch dispatcher thread.
//! The dispatcher is the only place aggregate progress is computed, so the
//! aggregation is a plain function of descriptor progress and never runs
//! concurrently with itself.

use std::collections::HashSet;
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::{
    BatchSettings, ConversionJob, JobDescriptor, JobEvent, JobId, JobRegistry, JobStatus,
};
use crate::encoder::{EncoderLocator, MediaProbe};
use crate::error::ConversionError;

/// Receives batch-level updates
///
/// Callbacks run on the batch's dispatcher thread. `on_aggregate_progress`
/// is called with the orchestrator's batch lock held and must not start or
/// cancel conversions itself.
pub trait BatchObserver: Send + Sync {
    /// Mean progress of every file in the batch, in `[0.0, 1.0]`
    fn on_aggregate_progress(&self, progress: f64);

    /// A job reached a terminal state
    fn on_job_finished(&self, _descriptor: &JobDescriptor) {}

    /// A job failed to launch or hit an I/O error
    fn on_job_error(&self, descriptor: &JobDescriptor, error: &ConversionError) {
        log::error!("{}: {}", descriptor.file_name(), error);
    }
}

impl<F> BatchObserver for F
where
    F: Fn(f64) + Send + Sync,
{
    fn on_aggregate_progress(&self, progress: f64) {
        self(progress)
    }
}

/// Arithmetic mean of every descriptor's progress; 0.0 for an empty batch
pub fn aggregate_progress(descriptors: &[Arc<JobDescriptor>]) -> f64 {
    if descriptors.is_empty() {
        return 0.0;
    }
    let sum: f64 = descriptors.iter().map(|d| d.progress()).sum();
    sum / descriptors.len() as f64
}

/// Result of starting a batch
pub struct BatchHandle {
    descriptors: Vec<Arc<JobDescriptor>>,
    started: usize,
    skipped: usize,
    dispatcher: Option<JoinHandle<()>>,
}

impl BatchHandle {
    /// Every descriptor in the batch, including skipped ones
    pub fn descriptors(&self) -> &[Arc<JobDescriptor>] {
        &self.descriptors
    }

    /// Jobs launched
    pub fn started(&self) -> usize {
        self.started
    }

    /// Descriptors skipped during validation
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Block until every job in the batch has finished
    pub fn wait(mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                log::error!("Conversion dispatcher panicked");
            }
        }
    }
}

/// Runs batches of conversions
///
/// Only one batch is active at a time; starting a new one cancels the old.
pub struct ConversionOrchestrator {
    locator: Arc<EncoderLocator>,
    probe: Arc<MediaProbe>,
    registry: Arc<JobRegistry>,
    /// Id of the current batch; guards aggregate publication
    current_batch: Arc<Mutex<u64>>,
}

impl ConversionOrchestrator {
    pub fn new(locator: Arc<EncoderLocator>) -> Self {
        let probe = Arc::new(MediaProbe::new(locator.clone()));
        Self {
            locator,
            probe,
            registry: Arc::new(JobRegistry::new()),
            current_batch: Arc::new(Mutex::new(0)),
        }
    }

    pub fn locator(&self) -> &Arc<EncoderLocator> {
        &self.locator
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Whether `descriptor` has a running job
    pub fn is_active(&self, descriptor: &JobDescriptor) -> bool {
        self.registry.contains(descriptor.id())
    }

    /// Validate and launch a batch
    ///
    /// Any previous batch is cancelled first, and this blocks until its jobs
    /// have removed their partial output. Files already in the target format
    /// and files whose output exists are marked skipped before this returns;
    /// everything else is reset to `Pending` and gets its own job thread.
    /// Returns without waiting for any of the new jobs.
    pub fn start_conversions(
        &self,
        jobs: &[Arc<JobDescriptor>],
        settings: BatchSettings,
        observer: Arc<dyn BatchObserver>,
    ) -> Result<BatchHandle, ConversionError> {
        self.cancel_conversions();
        // Cancelled jobs delete their partial output; let them finish first
        self.registry.wait_retired();

        let batch = {
            let mut current = self.current_batch.lock().unwrap_or_else(PoisonError::into_inner);
            *current += 1;
            *current
        };

        let settings = Arc::new(settings);
        let (events_tx, events_rx) = mpsc::channel();

        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(jobs.len());
        let mut runnable = Vec::new();
        let mut skipped = 0;

        for descriptor in jobs {
            if !seen.insert(descriptor.id()) {
                log::warn!("{} listed twice, ignoring repeat", descriptor.file_name());
                continue;
            }
            descriptor_checks(descriptor, &settings, &mut skipped, &mut runnable);
            descriptors.push(descriptor.clone());
        }

        log::info!(
            "Starting conversion: {} file(s), {} skipped",
            runnable.len(),
            skipped
        );

        let dispatcher = Dispatcher {
            batch,
            descriptors: descriptors.clone(),
            registry: self.registry.clone(),
            current_batch: self.current_batch.clone(),
            observer: observer.clone(),
        };
        let dispatcher = dispatcher.spawn(events_rx)?;

        let mut started = 0;
        for (descriptor, target_format) in runnable {
            let job = ConversionJob::new(
                descriptor.clone(),
                &target_format,
                settings.clone(),
                self.locator.clone(),
                self.probe.clone(),
                events_tx.clone(),
            );
            self.registry.insert(descriptor.id(), job.handle(), batch);

            match job.spawn() {
                Ok(_) => started += 1,
                Err(e) => {
                    self.registry.remove_finished(descriptor.id(), batch);
                    let error = ConversionError::Io(e);
                    descriptor.settle(JobStatus::Error {
                        message: error.to_string(),
                    });
                    observer.on_job_error(&descriptor, &error);
                }
            }
        }

        Ok(BatchHandle {
            descriptors,
            started,
            skipped,
            dispatcher: Some(dispatcher),
        })
    }

    /// Cancel every running job; the registry is empty afterwards
    pub fn cancel_conversions(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            log::info!("Cancelled {} conversion(s)", cancelled);
        }
        cancelled
    }

    /// Cancel one job; no-op if it is not running
    pub fn cancel_conversion(&self, descriptor: &JobDescriptor) -> bool {
        let cancelled = self.registry.cancel(descriptor.id());
        if cancelled {
            log::info!("Cancelled conversion of {}", descriptor.file_name());
        }
        cancelled
    }
}

impl Drop for ConversionOrchestrator {
    fn drop(&mut self) {
        self.registry.cancel_all();
    }
}

/// Pre-flight validation for one descriptor
///
/// Skipped descriptors are settled immediately; the rest are reset to
/// `Pending` and queued with their resolved target format.
fn descriptor_checks(
    descriptor: &Arc<JobDescriptor>,
    settings: &BatchSettings,
    skipped: &mut usize,
    runnable: &mut Vec<(Arc<JobDescriptor>, String)>,
) {
    let target_format = settings.effective_format(descriptor);

    if target_format.eq_ignore_ascii_case(descriptor.source_format()) {
        let reason = ConversionError::DuplicateTargetFormat {
            file_name: descriptor.file_name().to_string(),
            format: target_format,
        };
        log::warn!("Skipping: {}", reason);
        descriptor.settle(JobStatus::SkippedDuplicateFormat);
        *skipped += 1;
        return;
    }

    let output = settings.output_path(descriptor.source_path(), &target_format);
    if output.exists() {
        log::warn!("Skipping: {}", ConversionError::DuplicateOutputExists(output));
        descriptor.settle(JobStatus::SkippedDuplicateOutput);
        *skipped += 1;
        return;
    }

    // Drop any previous run's progress before the dispatcher first reports
    descriptor.settle(JobStatus::Pending);
    runnable.push((descriptor.clone(), target_format));
}

/// Folds job events for one batch into observer callbacks
struct Dispatcher {
    batch: u64,
    descriptors: Vec<Arc<JobDescriptor>>,
    registry: Arc<JobRegistry>,
    current_batch: Arc<Mutex<u64>>,
    observer: Arc<dyn BatchObserver>,
}

impl Dispatcher {
    fn spawn(self, events: Receiver<JobEvent>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("conversion-batch-{}", self.batch))
            .spawn(move || self.run(events))
    }

    /// Runs until every job's sender is dropped
    fn run(self, events: Receiver<JobEvent>) {
        self.publish();

        for event in events {
            match event {
                JobEvent::Progress { .. } => {}
                JobEvent::Finished { id, outcome } => self.finished(id, outcome),
            }
            self.publish();
        }

        log::debug!("Batch {} finished", self.batch);
    }

    fn finished(&self, id: JobId, outcome: Result<JobStatus, ConversionError>) {
        self.registry.remove_finished(id, self.batch);

        let Some(descriptor) = self.descriptors.iter().find(|d| d.id() == id) else {
            return;
        };
        if let Err(e) = &outcome {
            self.observer.on_job_error(descriptor, e);
        }
        self.observer.on_job_finished(descriptor);
    }

    /// Push the aggregate, unless a newer batch has started
    fn publish(&self) {
        let current = self.current_batch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == self.batch {
            self.observer
                .on_aggregate_progress(aggregate_progress(&self.descriptors));
        }
    }
}
