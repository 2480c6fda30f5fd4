//! Job repository: CRUD operations for the `jobs` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::DatabaseError;
use crate::categories::FeatureSet;
use crate::lifecycle::{Job, JobStatus};

pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize + ?Sized>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Encode { column, source })
}

pub(crate) fn parse_timestamp(column: &'static str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            column,
            value: s.to_string(),
        })
}

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub unit_type: Option<String>,
    /// JSON array of feature keys.
    pub features: String,
    pub assigned_worker: Option<String>,
    pub requester: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            unit_type: row.get("unit_type")?,
            features: row.get("features")?,
            assigned_worker: row.get("assigned_worker")?,
            requester: row.get("requester")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            duration_minutes: row.get("duration_minutes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn from_job(job: &Job) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: job.id.clone(),
            status: job.status.as_str().to_string(),
            unit_type: job.unit_type.map(|u| u.as_str().to_string()),
            features: to_json("features", &job.features)?,
            assigned_worker: job.assigned_worker.clone(),
            requester: job.requester.clone(),
            started_at: job.started_at.map(format_timestamp),
            completed_at: job.completed_at.map(format_timestamp),
            duration_minutes: job.duration_minutes,
            created_at: format_timestamp(job.created_at),
            updated_at: format_timestamp(job.updated_at),
        })
    }

    pub fn into_job(self) -> Result<Job, DatabaseError> {
        let status = self
            .status
            .parse::<JobStatus>()
            .map_err(|_| DatabaseError::InvalidValue {
                column: "status",
                value: self.status.clone(),
            })?;
        let unit_type = self
            .unit_type
            .as_deref()
            .map(|u| {
                u.parse().map_err(|_| DatabaseError::InvalidValue {
                    column: "unit_type",
                    value: u.to_string(),
                })
            })
            .transpose()?;
        let features: FeatureSet =
            serde_json::from_str(&self.features).map_err(|_| DatabaseError::InvalidValue {
                column: "features",
                value: self.features.clone(),
            })?;

        Ok(Job {
            id: self.id,
            status,
            unit_type,
            features,
            assigned_worker: self.assigned_worker,
            requester: self.requester,
            started_at: self
                .started_at
                .as_deref()
                .map(|s| parse_timestamp("started_at", s))
                .transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(|s| parse_timestamp("completed_at", s))
                .transpose()?,
            duration_minutes: self.duration_minutes,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub assigned_worker: Option<String>,
    pub requester: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, status, unit_type, features, assigned_worker, requester,
         started_at, completed_at, duration_minutes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            job.id,
            job.status,
            job.unit_type,
            job.features,
            job.assigned_worker,
            job.requester,
            job.started_at,
            job.completed_at,
            job.duration_minutes,
            job.created_at,
            job.updated_at,
        ],
    )?;
    Ok(())
}

/// Updates an existing job row. All fields except `id` and `created_at` are overwritten.
pub fn update(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status=?2, unit_type=?3, features=?4, assigned_worker=?5,
         requester=?6, started_at=?7, completed_at=?8, duration_minutes=?9, updated_at=?10
         WHERE id=?1",
        params![
            job.id,
            job.status,
            job.unit_type,
            job.features,
            job.assigned_worker,
            job.requester,
            job.started_at,
            job.completed_at,
            job.duration_minutes,
            job.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::JobNotFound(job.id.clone()));
    }
    Ok(())
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
        .optional()?;
    Ok(row)
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(conn: &Connection, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        conditions.push(format!("status = ?{}", param_values.len() + 1));
        param_values.push(Box::new(status.as_str().to_string()));
    }
    if let Some(ref worker) = filter.assigned_worker {
        conditions.push(format!("assigned_worker = ?{}", param_values.len() + 1));
        param_values.push(Box::new(worker.clone()));
    }
    if let Some(ref requester) = filter.requester {
        conditions.push(format!("requester = ?{}", param_values.len() + 1));
        param_values.push(Box::new(requester.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT * FROM jobs {} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let rows: Vec<JobRow> = stmt
        .query_map(params_ref.as_slice(), JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// Counts jobs with the given status.
pub fn count_by_status(conn: &Connection, status: JobStatus) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE status = ?1",
        params![status.as_str()],
        |r| r.get(0),
    )?;
    Ok(count)
}
