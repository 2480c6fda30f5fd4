//! Observer-side job list kept current from events.
//!
//! Events are hints. The view applies them optimistically and falls back to
//! a full refetch whenever it may have missed something.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::broadcast::{self, error::TryRecvError};

use super::events::{JobEvent, JobEventKind};
use crate::lifecycle::Job;

#[derive(Debug, Default)]
pub struct JobListView {
    jobs: BTreeMap<String, Job>,
    last_seq: HashMap<String, u64>,
    photo_uploads: HashMap<String, u64>,
    needs_refetch: bool,
}

impl JobListView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns `false` when the event was stale or a
    /// duplicate and was ignored.
    pub fn apply(&mut self, event: &JobEvent) -> bool {
        let last = self.last_seq.get(&event.job_id).copied().unwrap_or(0);
        if event.seq <= last {
            log::debug!(
                "Ignoring stale event seq {} for job {} (last {})",
                event.seq,
                event.job_id,
                last
            );
            return false;
        }
        self.last_seq.insert(event.job_id.clone(), event.seq);

        match (&event.kind, &event.job) {
            (JobEventKind::PhotoUploaded { .. }, _) => {
                *self.photo_uploads.entry(event.job_id.clone()).or_insert(0) += 1;
            }
            (JobEventKind::Reset, Some(job)) => {
                self.photo_uploads.remove(&event.job_id);
                self.jobs.insert(job.id.clone(), job.clone());
            }
            (_, Some(job)) => {
                self.jobs.insert(job.id.clone(), job.clone());
            }
            (_, None) => {
                // A job-level change without a snapshot cannot be applied.
                self.needs_refetch = true;
            }
        }
        true
    }

    /// Drains everything currently queued on `rx`. A lagged receiver marks
    /// the view for refetch. Returns the number of events applied.
    pub fn pump(&mut self, rx: &mut broadcast::Receiver<JobEvent>) -> usize {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if self.apply(&event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Job list view lagged by {} events; refetch needed", skipped);
                    self.needs_refetch = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    /// Replaces the view with authoritative state from the store.
    pub fn reconcile(&mut self, jobs: Vec<Job>) {
        self.jobs = jobs.into_iter().map(|j| (j.id.clone(), j)).collect();
        self.photo_uploads.clear();
        self.needs_refetch = false;
    }

    pub fn needs_refetch(&self) -> bool {
        self.needs_refetch
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Photo uploads observed since the last reconcile or reset.
    pub fn photo_uploads(&self, id: &str) -> u64 {
        self.photo_uploads.get(id).copied().unwrap_or(0)
    }
}
