//! Job change events fanned out to observers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::categories::Phase;
use crate::lifecycle::{Job, JobStatus};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Next process-wide event sequence number. Strictly increasing, so events
/// for one job published in order carry increasing numbers.
pub fn next_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// What happened to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobEventKind {
    Created,
    Started,
    Completed,
    Reset,
    Reassigned,
    AttributesUpdated,
    #[serde(rename_all = "camelCase")]
    PhotoUploaded {
        category_key: String,
        phase: Phase,
        storage_ref: String,
    },
}

impl std::fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEventKind::Created => write!(f, "Created"),
            JobEventKind::Started => write!(f, "Started"),
            JobEventKind::Completed => write!(f, "Completed"),
            JobEventKind::Reset => write!(f, "Reset"),
            JobEventKind::Reassigned => write!(f, "Reassigned"),
            JobEventKind::AttributesUpdated => write!(f, "Attributes updated"),
            JobEventKind::PhotoUploaded { category_key, phase, .. } => {
                write!(f, "Photo uploaded ({} {})", category_key, phase)
            }
        }
    }
}

/// A committed change to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub seq: u64,
    pub job_id: String,
    #[serde(flatten)]
    pub kind: JobEventKind,
    /// Job state right after the change, when the change touched the job
    /// record itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Event carrying a snapshot of the job after the change.
    pub fn with_snapshot(kind: JobEventKind, job: &Job, timestamp: DateTime<Utc>) -> Self {
        Self::snapshot_at(next_seq(), kind, job, timestamp)
    }

    /// Snapshot event with a sequence number the caller already took.
    pub fn snapshot_at(seq: u64, kind: JobEventKind, job: &Job, timestamp: DateTime<Utc>) -> Self {
        Self {
            seq,
            job_id: job.id.clone(),
            kind,
            job: Some(job.clone()),
            timestamp,
        }
    }

    pub fn photo_uploaded(
        job_id: &str,
        category_key: &str,
        phase: Phase,
        storage_ref: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: next_seq(),
            job_id: job_id.to_string(),
            kind: JobEventKind::PhotoUploaded {
                category_key: category_key.to_string(),
                phase,
                storage_ref: storage_ref.to_string(),
            },
            job: None,
            timestamp,
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(|j| j.status)
    }
}
