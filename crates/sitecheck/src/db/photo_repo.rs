//! Photo repository: confirmed uploads in `job_photos`.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, Row};

use super::job_repo::{format_timestamp, parse_timestamp};
use super::DatabaseError;
use crate::categories::Phase;
use crate::lifecycle::{CategoryCount, PhotoRecord};

struct PhotoRow {
    id: String,
    job_id: String,
    category_key: String,
    phase: String,
    storage_ref: String,
    source_mime: Option<String>,
    uploaded_at: String,
}

impl PhotoRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            category_key: row.get("category_key")?,
            phase: row.get("phase")?,
            storage_ref: row.get("storage_ref")?,
            source_mime: row.get("source_mime")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }

    fn into_record(self) -> Result<PhotoRecord, DatabaseError> {
        let phase = parse_phase(&self.phase)?;
        Ok(PhotoRecord {
            id: self.id,
            job_id: self.job_id,
            category_key: self.category_key,
            phase,
            storage_ref: self.storage_ref,
            source_mime: self.source_mime,
            uploaded_at: parse_timestamp("uploaded_at", &self.uploaded_at)?,
        })
    }
}

fn parse_phase(s: &str) -> Result<Phase, DatabaseError> {
    s.parse::<Phase>().map_err(|_| DatabaseError::InvalidValue {
        column: "phase",
        value: s.to_string(),
    })
}

pub fn insert(conn: &Connection, photo: &PhotoRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO job_photos (id, job_id, category_key, phase, storage_ref, source_mime, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            photo.id,
            photo.job_id,
            photo.category_key,
            photo.phase.as_str(),
            photo.storage_ref,
            photo.source_mime,
            format_timestamp(photo.uploaded_at),
        ],
    )?;
    Ok(())
}

/// Distinct category keys with at least one photo in `phase`.
pub fn category_keys(
    conn: &Connection,
    job_id: &str,
    phase: Phase,
) -> Result<BTreeSet<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT category_key FROM job_photos WHERE job_id = ?1 AND phase = ?2",
    )?;
    let keys = stmt
        .query_map(params![job_id, phase.as_str()], |r| r.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(keys)
}

/// Photo counts per (category, phase), ordered by phase then category.
pub fn counts(conn: &Connection, job_id: &str) -> Result<Vec<CategoryCount>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category_key, phase, COUNT(*) FROM job_photos WHERE job_id = ?1
         GROUP BY category_key, phase ORDER BY phase DESC, category_key",
    )?;
    let raw: Vec<(String, String, u64)> = stmt
        .query_map(params![job_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(category_key, phase, count)| {
            Ok(CategoryCount {
                category_key,
                phase: parse_phase(&phase)?,
                count,
            })
        })
        .collect()
}

pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<PhotoRecord>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM job_photos WHERE job_id = ?1 ORDER BY uploaded_at, id")?;
    let rows = stmt
        .query_map(params![job_id], PhotoRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PhotoRow::into_record).collect()
}

/// Deletes the photo records of a job. Stored blobs are left alone.
pub fn delete_for_job(conn: &Connection, job_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM job_photos WHERE job_id = ?1", params![job_id])?;
    Ok(deleted)
}
