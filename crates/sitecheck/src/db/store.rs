//! Persistence collaborator used by the lifecycle, ledger and upload pipeline.
//!
//! The trait is the seam; [`SqliteStore`] is the production implementation.
//! Multi-statement writes (a transition plus its ledger entry, or a reset)
//! run in one transaction so a failure leaves no partial state behind.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::job_repo::{self, JobFilter, JobRow};
use super::{activity_repo, photo_repo, Database, DatabaseError};
use crate::categories::Phase;
use crate::ledger::ActivityEntry;
use crate::lifecycle::{CategoryCount, Job, JobPatch, JobStatus, PhotoRecord};

/// Storage operations the domain needs. Implementations must be safe to
/// share across tasks.
pub trait Persistence: Send + Sync {
    fn create_job(&self, job: &Job) -> Result<(), DatabaseError>;

    fn read_job(&self, id: &str) -> Result<Option<Job>, DatabaseError>;

    /// Applies `patch` and returns the updated job, or `None` when the job
    /// does not exist.
    fn write_job(&self, id: &str, patch: &JobPatch) -> Result<Option<Job>, DatabaseError>;

    fn append_activity(&self, entry: &ActivityEntry) -> Result<(), DatabaseError>;

    fn read_activities(&self, job_id: &str) -> Result<Vec<ActivityEntry>, DatabaseError>;

    /// Category keys with at least one confirmed photo in `phase`.
    fn read_photo_category_keys(
        &self,
        job_id: &str,
        phase: Phase,
    ) -> Result<BTreeSet<String>, DatabaseError>;

    fn write_photo(&self, photo: &PhotoRecord) -> Result<(), DatabaseError>;

    fn read_photos(&self, job_id: &str) -> Result<Vec<PhotoRecord>, DatabaseError>;

    fn photo_counts(&self, job_id: &str) -> Result<Vec<CategoryCount>, DatabaseError>;

    /// Applies `patch` and appends `entry` atomically.
    fn commit_transition(
        &self,
        id: &str,
        patch: &JobPatch,
        entry: &ActivityEntry,
    ) -> Result<Job, DatabaseError>;

    /// Deletes photo records and activities, then returns the job to
    /// pending with its timestamps and duration cleared. Atomic.
    fn reset_job(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Job>, DatabaseError>;

    /// Returns the page of jobs matching `filter` and the total match count.
    fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, u64), DatabaseError>;

    fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError>;
}

/// SQLite-backed [`Persistence`].
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn load(conn: &rusqlite::Connection, id: &str) -> Result<Option<Job>, DatabaseError> {
    job_repo::find_by_id(conn, id)?
        .map(JobRow::into_job)
        .transpose()
}

fn patch_in_place(
    conn: &rusqlite::Connection,
    id: &str,
    patch: &JobPatch,
) -> Result<Option<Job>, DatabaseError> {
    let Some(mut job) = load(conn, id)? else {
        return Ok(None);
    };
    job.apply(patch);
    job_repo::update(conn, &JobRow::from_job(&job)?)?;
    Ok(Some(job))
}

impl Persistence for SqliteStore {
    fn create_job(&self, job: &Job) -> Result<(), DatabaseError> {
        self.db
            .with_conn(|conn| job_repo::insert(conn, &JobRow::from_job(job)?))
    }

    fn read_job(&self, id: &str) -> Result<Option<Job>, DatabaseError> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn write_job(&self, id: &str, patch: &JobPatch) -> Result<Option<Job>, DatabaseError> {
        self.db.with_tx(|tx| patch_in_place(tx, id, patch))
    }

    fn append_activity(&self, entry: &ActivityEntry) -> Result<(), DatabaseError> {
        self.db
            .with_conn(|conn| activity_repo::append(conn, entry).map(|_| ()))
    }

    fn read_activities(&self, job_id: &str) -> Result<Vec<ActivityEntry>, DatabaseError> {
        self.db
            .with_conn(|conn| activity_repo::list_for_job(conn, job_id))
    }

    fn read_photo_category_keys(
        &self,
        job_id: &str,
        phase: Phase,
    ) -> Result<BTreeSet<String>, DatabaseError> {
        self.db
            .with_conn(|conn| photo_repo::category_keys(conn, job_id, phase))
    }

    fn write_photo(&self, photo: &PhotoRecord) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| photo_repo::insert(conn, photo))
    }

    fn read_photos(&self, job_id: &str) -> Result<Vec<PhotoRecord>, DatabaseError> {
        self.db
            .with_conn(|conn| photo_repo::list_for_job(conn, job_id))
    }

    fn photo_counts(&self, job_id: &str) -> Result<Vec<CategoryCount>, DatabaseError> {
        self.db.with_conn(|conn| photo_repo::counts(conn, job_id))
    }

    fn commit_transition(
        &self,
        id: &str,
        patch: &JobPatch,
        entry: &ActivityEntry,
    ) -> Result<Job, DatabaseError> {
        self.db.with_tx(|tx| {
            let job = patch_in_place(tx, id, patch)?
                .ok_or_else(|| DatabaseError::JobNotFound(id.to_string()))?;
            activity_repo::append(tx, entry)?;
            Ok(job)
        })
    }

    fn reset_job(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Job>, DatabaseError> {
        self.db.with_tx(|tx| {
            let Some(mut job) = load(tx, id)? else {
                return Ok(None);
            };
            let photos = photo_repo::delete_for_job(tx, id)?;
            let activities = activity_repo::delete_for_job(tx, id)?;
            job.reset(at);
            job_repo::update(tx, &JobRow::from_job(&job)?)?;
            log::debug!(
                "Reset job {}: removed {} photo records and {} activities",
                id,
                photos,
                activities
            );
            Ok(Some(job))
        })
    }

    fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, u64), DatabaseError> {
        self.db.with_conn(|conn| {
            let (rows, total) = job_repo::query(conn, filter)?;
            let jobs = rows
                .into_iter()
                .map(JobRow::into_job)
                .collect::<Result<Vec<_>, _>>()?;
            Ok((jobs, total))
        })
    }

    fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        self.db
            .with_conn(|conn| job_repo::count_by_status(conn, status))
    }
}
