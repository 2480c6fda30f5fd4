//! Persistence wrapper that stalls selected calls, to force concurrent
//! lifecycle operations to overlap.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use sitecheck::db::DatabaseError;
use sitecheck::lifecycle::{CategoryCount, JobPatch, JobStatus, PhotoRecord};
use sitecheck::{ActivityEntry, Job, JobFilter, Persistence, Phase, SqliteStore};

pub struct DelayedStore {
    pub inner: Arc<SqliteStore>,
    /// Sleep before every `read_job`.
    pub read_delay: Duration,
    /// Sleep after `commit_transition` has committed, before returning.
    pub commit_delay: Duration,
}

impl DelayedStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            read_delay: Duration::ZERO,
            commit_delay: Duration::ZERO,
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }
}

impl Persistence for DelayedStore {
    fn create_job(&self, job: &Job) -> Result<(), DatabaseError> {
        self.inner.create_job(job)
    }

    fn read_job(&self, id: &str) -> Result<Option<Job>, DatabaseError> {
        std::thread::sleep(self.read_delay);
        self.inner.read_job(id)
    }

    fn write_job(&self, id: &str, patch: &JobPatch) -> Result<Option<Job>, DatabaseError> {
        self.inner.write_job(id, patch)
    }

    fn append_activity(&self, entry: &ActivityEntry) -> Result<(), DatabaseError> {
        self.inner.append_activity(entry)
    }

    fn read_activities(&self, job_id: &str) -> Result<Vec<ActivityEntry>, DatabaseError> {
        self.inner.read_activities(job_id)
    }

    fn read_photo_category_keys(
        &self,
        job_id: &str,
        phase: Phase,
    ) -> Result<BTreeSet<String>, DatabaseError> {
        self.inner.read_photo_category_keys(job_id, phase)
    }

    fn write_photo(&self, photo: &PhotoRecord) -> Result<(), DatabaseError> {
        self.inner.write_photo(photo)
    }

    fn read_photos(&self, job_id: &str) -> Result<Vec<PhotoRecord>, DatabaseError> {
        self.inner.read_photos(job_id)
    }

    fn photo_counts(&self, job_id: &str) -> Result<Vec<CategoryCount>, DatabaseError> {
        self.inner.photo_counts(job_id)
    }

    fn commit_transition(
        &self,
        id: &str,
        patch: &JobPatch,
        entry: &ActivityEntry,
    ) -> Result<Job, DatabaseError> {
        let job = self.inner.commit_transition(id, patch, entry)?;
        std::thread::sleep(self.commit_delay);
        Ok(job)
    }

    fn reset_job(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Job>, DatabaseError> {
        self.inner.reset_job(id, at)
    }

    fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, u64), DatabaseError> {
        self.inner.list_jobs(filter)
    }

    fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        self.inner.count_by_status(status)
    }
}
