//! Job state machine.
//!
//! `pending -> in_progress -> completed`, plus an administrative reset back
//! to `pending` from anywhere. Start and complete re-run the documentation
//! gate against persisted photos and commit status, timestamps and the
//! ledger entry in one transaction. Transitions on the same job are
//! serialized through a per-job async lock; reset deliberately skips it and
//! wins whenever it commits last. Every commit takes its event sequence
//! number under one ordering gate, so the event with the highest sequence
//! always carries the state that was written last.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info_span;

use super::clock::Clock;
use super::{Actor, CategoryCount, Job, JobDraft, JobPatch, JobStatus, Role};
use crate::broadcast::{next_seq, Channel, JobEvent, JobEventKind, NotificationTransport};
use crate::catalog::{FeatureCatalog, UnitType};
use crate::categories::{FeatureSet, Phase};
use crate::db::{DatabaseError, JobFilter, Persistence};
use crate::error::TransitionError;
use crate::gate::{self, GateDecision};
use crate::ledger::{self, ActivityEntry};

/// Attributes a worker may supply with the start transition, or an
/// administrator may edit later. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub unit_type: Option<UnitType>,
    pub features: Option<FeatureSet>,
}

impl AttributeUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn unit_type(mut self, unit_type: UnitType) -> Self {
        self.unit_type = Some(unit_type);
        self
    }

    pub fn features(mut self, features: &[&str]) -> Self {
        self.features = Some(features.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.unit_type.is_none() && self.features.is_none()
    }
}

/// Reporting output for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: String,
    pub status: JobStatus,
    pub duration_minutes: Option<i64>,
    /// Seconds on the running timer; 0 unless the job is being worked on.
    pub elapsed_seconds: i64,
    pub photo_counts: Vec<CategoryCount>,
}

/// One page of a job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
}

type JobLock = Arc<tokio::sync::Mutex<()>>;

/// Owns job status and the legal transitions between states.
pub struct JobLifecycle {
    store: Arc<dyn Persistence>,
    catalog: Arc<FeatureCatalog>,
    notifier: Arc<dyn NotificationTransport>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<String, JobLock>>,
    commit_order: Mutex<()>,
}

impl JobLifecycle {
    pub fn new(
        store: Arc<dyn Persistence>,
        catalog: Arc<FeatureCatalog>,
        notifier: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            clock,
            locks: Mutex::new(HashMap::new()),
            commit_order: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    fn lock_for(&self, job_id: &str) -> JobLock {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(job_id.to_string()).or_default())
    }

    /// Runs `write` and takes the next event sequence number before any
    /// other commit can land.
    fn commit<F>(&self, write: F) -> Result<(Job, u64), TransitionError>
    where
        F: FnOnce() -> Result<Job, TransitionError>,
    {
        let _order = match self.commit_order.lock() {
            Ok(order) => order,
            Err(poisoned) => poisoned.into_inner(),
        };
        let job = write()?;
        Ok((job, next_seq()))
    }

    fn load(&self, job_id: &str) -> Result<Job, TransitionError> {
        self.store
            .read_job(job_id)
            .map_err(persistence_failure)?
            .ok_or_else(|| TransitionError::NotFound(job_id.to_string()))
    }

    fn publish(&self, event: JobEvent) {
        self.notifier.publish(&Channel::job(&event.job_id), event);
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job, TransitionError> {
        self.load(job_id)
    }

    /// Ingests a job from the scheduling side in `pending`.
    pub fn register_job(&self, actor: &Actor, draft: JobDraft) -> Result<Job, TransitionError> {
        require_administrator(actor, &draft.id, "register")?;

        if let Some(existing) = self.store.read_job(&draft.id).map_err(persistence_failure)? {
            log::warn!("Job {} already registered ({})", existing.id, existing.status);
            return Err(TransitionError::Conflict {
                job_id: existing.id,
                status: existing.status,
                attempted: "register",
            });
        }

        let unknown: Vec<&String> = draft
            .features
            .iter()
            .filter(|f| !self.catalog.is_known(f))
            .collect();
        if !unknown.is_empty() {
            log::debug!("Job {} carries unknown features {:?}; they will be ignored", draft.id, unknown);
        }

        let job = Job::from_draft(draft, self.clock.now());
        let (job, seq) = self.commit(|| {
            self.store.create_job(&job).map_err(persistence_failure)?;
            Ok(job)
        })?;
        log::info!("Registered job {} for worker {:?}", job.id, job.assigned_worker);

        let event = JobEvent::snapshot_at(seq, JobEventKind::Created, &job, job.created_at);
        self.notifier
            .publish(&Channel::Role(Role::Administrator), event.clone());
        self.publish(event);
        Ok(job)
    }

    /// `pending -> in_progress`.
    ///
    /// Attributes in `update` are applied with the transition and are the
    /// ones the before-phase gate is evaluated against. Starting a job that
    /// is already in progress returns it unchanged.
    pub async fn start(
        &self,
        actor: &Actor,
        job_id: &str,
        update: AttributeUpdate,
    ) -> Result<Job, TransitionError> {
        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;
        self.start_locked(actor, job_id, update)
    }

    fn start_locked(
        &self,
        actor: &Actor,
        job_id: &str,
        update: AttributeUpdate,
    ) -> Result<Job, TransitionError> {
        let _span = info_span!("job.start", job_id = %job_id, actor = %actor.id).entered();

        let job = self.load(job_id)?;
        require_assignee(actor, &job, "start")?;

        match job.status {
            JobStatus::InProgress => {
                log::info!("Job {} already in progress; start is a no-op", job_id);
                return Ok(job);
            }
            JobStatus::Completed => return Err(conflict(&job, "start")),
            JobStatus::Pending => {}
        }

        let unit_type = update.unit_type.or(job.unit_type);
        let features = update.features.as_ref().unwrap_or(&job.features);
        let captured = self
            .store
            .read_photo_category_keys(job_id, Phase::Before)
            .map_err(persistence_failure)?;
        let decision = gate::check(&self.catalog, unit_type, features, Phase::Before, &captured);
        if !decision.allowed {
            return Err(rejected(job_id, decision));
        }

        let now = self.clock.now();
        let mut patch = JobPatch::at(now);
        patch.status = Some(JobStatus::InProgress);
        patch.unit_type = update.unit_type;
        patch.features = update.features;
        if job.started_at.is_none() {
            patch.started_at = Some(now);
        }

        let (job, seq) = self.commit(|| {
            self.store
                .commit_transition(job_id, &patch, &ActivityEntry::start(job_id, now))
                .map_err(persistence_failure)
        })?;

        log::info!("Job {} started by {}", job_id, actor.id);
        self.publish(JobEvent::snapshot_at(seq, JobEventKind::Started, &job, now));
        Ok(job)
    }

    /// `in_progress -> completed`. Completing an already completed job
    /// returns it unchanged.
    pub async fn complete(&self, actor: &Actor, job_id: &str) -> Result<Job, TransitionError> {
        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;
        self.complete_locked(actor, job_id)
    }

    fn complete_locked(&self, actor: &Actor, job_id: &str) -> Result<Job, TransitionError> {
        let _span = info_span!("job.complete", job_id = %job_id, actor = %actor.id).entered();

        let job = self.load(job_id)?;
        require_assignee(actor, &job, "complete")?;

        match job.status {
            JobStatus::Completed => {
                log::info!("Job {} already completed; complete is a no-op", job_id);
                return Ok(job);
            }
            JobStatus::Pending => return Err(conflict(&job, "complete")),
            JobStatus::InProgress => {}
        }

        let captured = self
            .store
            .read_photo_category_keys(job_id, Phase::After)
            .map_err(persistence_failure)?;
        let decision = gate::can_transition(&self.catalog, &job, Phase::After, &captured);
        if !decision.allowed {
            return Err(rejected(job_id, decision));
        }

        let now = self.clock.now();
        let stop = ActivityEntry::stop(job_id, now);
        let mut entries = self.store.read_activities(job_id).map_err(persistence_failure)?;
        entries.push(stop.clone());

        let mut patch = JobPatch::at(now);
        patch.status = Some(JobStatus::Completed);
        patch.completed_at = Some(now);
        patch.duration_minutes = ledger::total_duration_minutes(&entries);

        let (job, seq) = self.commit(|| {
            self.store
                .commit_transition(job_id, &patch, &stop)
                .map_err(persistence_failure)
        })?;

        log::info!(
            "Job {} completed by {} after {:?} minutes",
            job_id,
            actor.id,
            job.duration_minutes
        );
        self.publish(JobEvent::snapshot_at(seq, JobEventKind::Completed, &job, now));
        Ok(job)
    }

    /// Any state -> `pending`, wiping photos, activities, timestamps and the
    /// duration. Irreversible. Does not wait for in-flight transitions.
    pub fn reset(&self, actor: &Actor, job_id: &str) -> Result<Job, TransitionError> {
        let _span = info_span!("job.reset", job_id = %job_id, actor = %actor.id).entered();
        require_administrator(actor, job_id, "reset")?;

        let now = self.clock.now();
        let (job, seq) = self.commit(|| {
            self.store
                .reset_job(job_id, now)
                .map_err(persistence_failure)?
                .ok_or_else(|| TransitionError::NotFound(job_id.to_string()))
        })?;

        log::warn!("Job {} reset to pending by {}", job_id, actor.id);
        self.publish(JobEvent::snapshot_at(seq, JobEventKind::Reset, &job, now));
        Ok(job)
    }

    /// Hands the job to another worker.
    pub async fn reassign(
        &self,
        actor: &Actor,
        job_id: &str,
        worker_id: &str,
    ) -> Result<Job, TransitionError> {
        require_administrator(actor, job_id, "reassign")?;
        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let mut patch = JobPatch::at(now);
        patch.assigned_worker = Some(worker_id.to_string());
        let (job, seq) = self.commit(|| {
            self.store
                .write_job(job_id, &patch)
                .map_err(persistence_failure)?
                .ok_or_else(|| TransitionError::NotFound(job_id.to_string()))
        })?;

        log::info!("Job {} reassigned to {} by {}", job_id, worker_id, actor.id);
        self.publish(JobEvent::snapshot_at(seq, JobEventKind::Reassigned, &job, now));
        Ok(job)
    }

    /// Administrative edit of unit type and features, allowed in any state.
    pub async fn update_attributes(
        &self,
        actor: &Actor,
        job_id: &str,
        update: AttributeUpdate,
    ) -> Result<Job, TransitionError> {
        require_administrator(actor, job_id, "edit")?;
        let lock = self.lock_for(job_id);
        let _guard = lock.lock().await;

        if update.is_empty() {
            return self.load(job_id);
        }

        let now = self.clock.now();
        let mut patch = JobPatch::at(now);
        patch.unit_type = update.unit_type;
        patch.features = update.features;
        let (job, seq) = self.commit(|| {
            self.store
                .write_job(job_id, &patch)
                .map_err(persistence_failure)?
                .ok_or_else(|| TransitionError::NotFound(job_id.to_string()))
        })?;

        log::info!("Job {} attributes updated by {}", job_id, actor.id);
        self.publish(JobEvent::snapshot_at(seq, JobEventKind::AttributesUpdated, &job, now));
        Ok(job)
    }

    /// Gate decision for `phase` against persisted photos. This is what a
    /// client uses to enable or disable its confirm action.
    pub fn readiness(&self, job_id: &str, phase: Phase) -> Result<GateDecision, TransitionError> {
        let job = self.load(job_id)?;
        let captured = self
            .store
            .read_photo_category_keys(job_id, phase)
            .map_err(persistence_failure)?;
        Ok(gate::can_transition(&self.catalog, &job, phase, &captured))
    }

    /// Running timer rebuilt from the ledger; 0 when not running.
    pub fn elapsed_seconds(&self, job_id: &str) -> Result<i64, TransitionError> {
        let entries = self.store.read_activities(job_id).map_err(persistence_failure)?;
        Ok(ledger::elapsed_seconds(&entries, self.clock.now()))
    }

    pub fn report(&self, job_id: &str) -> Result<JobReport, TransitionError> {
        let job = self.load(job_id)?;
        let elapsed_seconds = if job.status == JobStatus::InProgress {
            self.elapsed_seconds(job_id)?
        } else {
            0
        };
        let photo_counts = self.store.photo_counts(job_id).map_err(persistence_failure)?;

        Ok(JobReport {
            job_id: job.id,
            status: job.status,
            duration_minutes: job.duration_minutes,
            elapsed_seconds,
            photo_counts,
        })
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<JobPage, TransitionError> {
        let (jobs, total) = self.store.list_jobs(filter).map_err(persistence_failure)?;
        Ok(JobPage { jobs, total })
    }

    pub fn status_counts(&self) -> Result<StatusCounts, TransitionError> {
        let count = |status| self.store.count_by_status(status).map_err(persistence_failure);
        Ok(StatusCounts {
            pending: count(JobStatus::Pending)?,
            in_progress: count(JobStatus::InProgress)?,
            completed: count(JobStatus::Completed)?,
        })
    }
}

fn require_assignee(actor: &Actor, job: &Job, attempted: &'static str) -> Result<(), TransitionError> {
    if actor.role == Role::Worker && job.is_assigned_to(&actor.id) {
        return Ok(());
    }
    log::info!("{} refused: {} is not the assigned worker of job {}", attempted, actor.id, job.id);
    Err(TransitionError::Forbidden {
        actor: actor.id.clone(),
        role: actor.role,
        job_id: job.id.clone(),
        attempted,
    })
}

fn require_administrator(
    actor: &Actor,
    job_id: &str,
    attempted: &'static str,
) -> Result<(), TransitionError> {
    if actor.is_administrator() {
        return Ok(());
    }
    log::info!("{} refused: {} is not an administrator", attempted, actor.id);
    Err(TransitionError::Forbidden {
        actor: actor.id.clone(),
        role: actor.role,
        job_id: job_id.to_string(),
        attempted,
    })
}

fn rejected(job_id: &str, decision: GateDecision) -> TransitionError {
    log::debug!(
        "Gate rejected job {}: missing {:?}, blocked by {:?}",
        job_id,
        decision.missing,
        decision.blocked_by
    );
    TransitionError::Rejected(decision)
}

fn conflict(job: &Job, attempted: &'static str) -> TransitionError {
    log::warn!("Cannot {} job {}: status is {}", attempted, job.id, job.status);
    TransitionError::Conflict {
        job_id: job.id.clone(),
        status: job.status,
        attempted,
    }
}

fn persistence_failure(err: DatabaseError) -> TransitionError {
    log::error!("Persistence failure: {}", err);
    TransitionError::Persistence(err)
}
