//! Activity repository: the append-only `job_activities` log.

use rusqlite::{params, Connection};

use super::job_repo::{format_timestamp, parse_timestamp};
use super::DatabaseError;
use crate::ledger::{ActivityAction, ActivityEntry};

/// Appends one entry. Returns the row id, which fixes the entry's position.
pub fn append(conn: &Connection, entry: &ActivityEntry) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO job_activities (job_id, action, at, notes) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.job_id,
            entry.action.as_str(),
            format_timestamp(entry.at),
            entry.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Entries for a job in append order.
pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<ActivityEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, action, at, notes FROM job_activities WHERE job_id = ?1 ORDER BY id",
    )?;
    let raw: Vec<(String, String, String, Option<String>)> = stmt
        .query_map(params![job_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(job_id, action, at, notes)| {
            let action = action
                .parse::<ActivityAction>()
                .map_err(|_| DatabaseError::InvalidValue {
                    column: "action",
                    value: action.clone(),
                })?;
            Ok(ActivityEntry {
                job_id,
                action,
                at: parse_timestamp("at", &at)?,
                notes,
            })
        })
        .collect()
}

/// Deletes every entry of a job. Returns the number of rows removed.
pub fn delete_for_job(conn: &Connection, job_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM job_activities WHERE job_id = ?1", params![job_id])?;
    Ok(deleted)
}
