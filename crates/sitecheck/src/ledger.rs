//! Activity ledger: the append-only start/stop log of a job.
//!
//! Elapsed and total durations are projections over the log, recomputed on
//! each read. Nothing caches a running "elapsed" value, so a client with no
//! local state can rebuild its timer from the job id alone.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{DatabaseError, Persistence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Start,
    Stop,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Start => "start",
            ActivityAction::Stop => "stop",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ActivityAction::Start),
            "stop" => Ok(ActivityAction::Stop),
            other => Err(format!("unknown activity action '{}'", other)),
        }
    }
}

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub job_id: String,
    pub action: ActivityAction,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ActivityEntry {
    pub fn start(job_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            action: ActivityAction::Start,
            at,
            notes: None,
        }
    }

    pub fn stop(job_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            action: ActivityAction::Stop,
            at,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

struct Scan {
    closed_seconds: i64,
    closed_pairs: usize,
    open_since: Option<DateTime<Utc>>,
}

/// Walks entries in append order. A start opens (or re-opens) the timer, a
/// stop closes the open start; a stop with nothing open is ignored.
fn scan(entries: &[ActivityEntry]) -> Scan {
    let mut out = Scan {
        closed_seconds: 0,
        closed_pairs: 0,
        open_since: None,
    };

    for entry in entries {
        match entry.action {
            ActivityAction::Start => out.open_since = Some(entry.at),
            ActivityAction::Stop => {
                if let Some(started) = out.open_since.take() {
                    out.closed_seconds += (entry.at - started).num_seconds().max(0);
                    out.closed_pairs += 1;
                }
            }
        }
    }

    out
}

/// Time of the most recent start with no later stop.
pub fn running_since(entries: &[ActivityEntry]) -> Option<DateTime<Utc>> {
    scan(entries).open_since
}

/// Seconds since the unmatched start, or 0 when the timer is not running.
pub fn elapsed_seconds(entries: &[ActivityEntry], now: DateTime<Utc>) -> i64 {
    running_since(entries)
        .map(|since| (now - since).num_seconds().max(0))
        .unwrap_or(0)
}

/// Sum of every closed start/stop pair, truncated to whole minutes.
/// `None` when no pair has been closed.
pub fn total_duration_minutes(entries: &[ActivityEntry]) -> Option<i64> {
    let scan = scan(entries);
    (scan.closed_pairs > 0).then_some(scan.closed_seconds / 60)
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Job '{0}' already has a running timer")]
    AlreadyRunning(String),

    #[error("Job '{0}' has no running timer")]
    NotRunning(String),

    #[error("Ledger storage failed: {0}")]
    Database(#[from] DatabaseError),
}

/// Ledger bound to the persistence collaborator.
#[derive(Clone)]
pub struct ActivityLedger {
    store: Arc<dyn Persistence>,
}

impl ActivityLedger {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Appends a start entry. Refuses when a start is already open so that
    /// starts and stops keep alternating.
    pub fn record_start(&self, job_id: &str, at: DateTime<Utc>) -> Result<(), LedgerError> {
        let entries = self.store.read_activities(job_id)?;
        if running_since(&entries).is_some() {
            return Err(LedgerError::AlreadyRunning(job_id.to_string()));
        }
        self.store.append_activity(&ActivityEntry::start(job_id, at))?;
        Ok(())
    }

    /// Appends a stop entry closing the open start.
    pub fn record_stop(&self, job_id: &str, at: DateTime<Utc>) -> Result<(), LedgerError> {
        let entries = self.store.read_activities(job_id)?;
        if running_since(&entries).is_none() {
            return Err(LedgerError::NotRunning(job_id.to_string()));
        }
        self.store.append_activity(&ActivityEntry::stop(job_id, at))?;
        Ok(())
    }

    pub fn entries(&self, job_id: &str) -> Result<Vec<ActivityEntry>, LedgerError> {
        Ok(self.store.read_activities(job_id)?)
    }

    pub fn running_since(&self, job_id: &str) -> Result<Option<DateTime<Utc>>, LedgerError> {
        Ok(running_since(&self.store.read_activities(job_id)?))
    }

    pub fn elapsed_seconds(&self, job_id: &str, now: DateTime<Utc>) -> Result<i64, LedgerError> {
        Ok(elapsed_seconds(&self.store.read_activities(job_id)?, now))
    }

    pub fn total_duration_minutes(&self, job_id: &str) -> Result<Option<i64>, LedgerError> {
        Ok(total_duration_minutes(&self.store.read_activities(job_id)?))
    }
}
