//! Job record and the patches the lifecycle applies to it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::UnitType;
use crate::categories::FeatureSet;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A schedulable unit of field work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<UnitType>,
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a pending job from a creation payload.
    pub fn from_draft(draft: JobDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: draft.id,
            status: JobStatus::Pending,
            unit_type: draft.unit_type,
            features: draft.features,
            assigned_worker: draft.assigned_worker,
            requester: draft.requester,
            started_at: None,
            completed_at: None,
            duration_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_assigned_to(&self, worker_id: &str) -> bool {
        self.assigned_worker.as_deref() == Some(worker_id)
    }

    /// Applies the set fields of `patch`.
    pub fn apply(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(unit_type) = patch.unit_type {
            self.unit_type = Some(unit_type);
        }
        if let Some(ref features) = patch.features {
            self.features = features.clone();
        }
        if let Some(ref worker) = patch.assigned_worker {
            self.assigned_worker = Some(worker.clone());
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(minutes) = patch.duration_minutes {
            self.duration_minutes = Some(minutes);
        }
        self.updated_at = patch.updated_at;
    }

    /// Clears everything a reset wipes.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.duration_minutes = None;
        self.updated_at = now;
    }
}

/// Creation payload from the scheduling side.
///
/// `unit_type` must be a known unit type (rejected by deserialization
/// otherwise); feature keys are kept as given and unknown ones are ignored
/// when categories are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub id: String,
    #[serde(default)]
    pub unit_type: Option<UnitType>,
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub assigned_worker: Option<String>,
    #[serde(default)]
    pub requester: Option<String>,
}

impl JobDraft {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            unit_type: None,
            features: FeatureSet::new(),
            assigned_worker: None,
            requester: None,
        }
    }

    pub fn assigned_to(mut self, worker_id: &str) -> Self {
        self.assigned_worker = Some(worker_id.to_string());
        self
    }

    pub fn with_unit_type(mut self, unit_type: UnitType) -> Self {
        self.unit_type = Some(unit_type);
        self
    }

    pub fn with_features(mut self, features: &[&str]) -> Self {
        self.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn requested_by(mut self, requester: &str) -> Self {
        self.requester = Some(requester.to_string());
        self
    }
}

/// Partial update of a job. Unset fields are left untouched; clearing
/// fields is only done by a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub unit_type: Option<UnitType>,
    pub features: Option<FeatureSet>,
    pub assigned_worker: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl JobPatch {
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            unit_type: None,
            features: None,
            assigned_worker: None,
            started_at: None,
            completed_at: None,
            duration_minutes: None,
            updated_at,
        }
    }
}
