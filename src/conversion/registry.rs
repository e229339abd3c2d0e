//! Registry of running jobs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{JobHandle, JobId};

struct Entry {
    handle: Arc<JobHandle>,
    /// Batch that launched the job
    batch: u64,
}

/// Maps descriptor ids to the handles of their running jobs
///
/// An id is present only while its job is active. Absence means the job is
/// pending, finished, or was never started. Cancelled jobs leave the map at
/// once but are kept aside until their cleanup is done.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Entry>>,
    /// Cancelled jobs that may still be removing partial output
    retiring: Mutex<Vec<Arc<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retiring(&self) -> MutexGuard<'_, Vec<Arc<JobHandle>>> {
        self.retiring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel `handle` and keep it until its job has wound down
    fn retire(&self, handle: Arc<JobHandle>) {
        handle.cancel();
        let mut retiring = self.retiring();
        retiring.retain(|h| !h.is_finished());
        retiring.push(handle);
    }

    /// Track a running job; an older job for the same id is cancelled
    pub(crate) fn insert(&self, id: JobId, handle: Arc<JobHandle>, batch: u64) {
        let previous = self.jobs().insert(id, Entry { handle, batch });
        if let Some(previous) = previous {
            self.retire(previous.handle);
        }
    }

    /// Drop the entry for `id` if it still belongs to `batch`
    pub(crate) fn remove_finished(&self, id: JobId, batch: u64) -> bool {
        let mut jobs = self.jobs();
        match jobs.get(&id) {
            Some(entry) if entry.batch == batch => {
                jobs.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Cancel and deregister one job; false if it was not active
    pub fn cancel(&self, id: JobId) -> bool {
        let entry = self.jobs().remove(&id);
        match entry {
            Some(entry) => {
                self.retire(entry.handle);
                true
            }
            None => false,
        }
    }

    /// Cancel every job and leave the registry empty
    ///
    /// Returns how many jobs were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Entry> = self.jobs().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            self.retire(entry.handle);
        }
        count
    }

    /// Block until every cancelled job has finished its cleanup
    pub fn wait_retired(&self) {
        let retiring = std::mem::take(&mut *self.retiring());
        for handle in retiring {
            handle.wait_finished();
        }
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}
