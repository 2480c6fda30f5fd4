use std::path::PathBuf;
use thiserror::Error;

use crate::categories::Phase;
use crate::db::DatabaseError;
use crate::gate::GateDecision;
use crate::lifecycle::{JobStatus, Role};

#[derive(Error, Debug)]
pub enum SitecheckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Subscription error: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid feature '{key}': {reason}")]
    InvalidFeature { key: String, reason: String },
}

/// Failure of a lifecycle operation.
#[derive(Error, Debug)]
pub enum TransitionError {
    /// The documentation gate refused the transition. Nothing was written.
    #[error("Transition rejected: missing {} categories{}", .0.missing.len(), blocked_suffix(.0))]
    Rejected(GateDecision),

    /// The job is not in a state the operation can start from.
    #[error("Job '{job_id}' is {status}, cannot {attempted}; refresh and retry")]
    Conflict {
        job_id: String,
        status: JobStatus,
        attempted: &'static str,
    },

    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Actor '{actor}' ({role:?}) may not {attempted} job '{job_id}'")]
    Forbidden {
        actor: String,
        role: Role,
        job_id: String,
        attempted: &'static str,
    },

    /// Writing the new state failed after validation passed. The caller
    /// must re-read the job before retrying.
    #[error("Failed to persist transition: {0}")]
    Persistence(#[from] DatabaseError),
}

fn blocked_suffix(decision: &GateDecision) -> &'static str {
    if decision.blocked_by.is_some() {
        " (unit type not set)"
    } else {
        ""
    }
}

impl TransitionError {
    /// The caller can fix this by capturing photos or choosing a unit type.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, TransitionError::Rejected(_))
    }

    /// Retrying after a refresh may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransitionError::Persistence(_) | TransitionError::Conflict { .. }
        )
    }

    /// Missing category keys when the gate rejected the transition.
    pub fn missing_categories(&self) -> Option<&[String]> {
        match self {
            TransitionError::Rejected(decision) => Some(&decision.missing),
            _ => None,
        }
    }
}

/// Failure of a single file upload. Other files are unaffected.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to normalize image: {0}")]
    Normalize(String),

    #[error("Upload of '{key}' timed out after {seconds}s")]
    Timeout { key: String, seconds: u64 },

    #[error("Failed to store photo: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown category '{key}' for phase {phase}")]
    UnknownCategory { key: String, phase: Phase },

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Job '{job_id}' is {status}; before photos can no longer be added")]
    PhaseClosed { job_id: String, status: JobStatus },

    #[error("Category '{key}' is not required for the {phase} phase of this job")]
    CategoryNotRequired { key: String, phase: Phase },

    #[error("Failed to record photo: {0}")]
    Persistence(#[from] DatabaseError),
}

impl UploadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UploadError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Blob write task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("Role {role:?} may not subscribe to {channel}")]
    Unauthorized { role: Role, channel: String },
}

pub type Result<T> = std::result::Result<T, SitecheckError>;
