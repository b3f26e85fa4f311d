use rusqlite::{Connection, Row};

use crate::db::job::state::JobState;

/// One row of the job table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: i64,
    pub batch_id: Option<String>,
    pub user_id: String,
    pub lsid: String,
    pub params: String,
    pub working_dir: Option<String>,
    pub state: JobState,
    pub queue_id: Option<String>,
}

const COLUMNS: &str = "id, batch_id, user_id, lsid, params, working_dir, state, queue_id";

pub fn get_job(conn: &Connection, job_id: i64) -> rusqlite::Result<JobRecord> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM job WHERE id = ?1"), [job_id], from_row)
}

/// All jobs of a batch, in submission order
pub fn get_batch(conn: &Connection, batch_id: &str) -> rusqlite::Result<Vec<JobRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM job WHERE batch_id = ?1 ORDER BY id"))?;
    let rows = stmt.query_map([batch_id], from_row)?;
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row?);
    }
    Ok(jobs)
}

fn from_row(row: &Row) -> rusqlite::Result<JobRecord> {
    let state: String = row.get(6)?;
    let state = state
        .parse::<JobState>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, err.into()))?;
    Ok(JobRecord {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        user_id: row.get(2)?,
        lsid: row.get(3)?,
        params: row.get(4)?,
        working_dir: row.get(5)?,
        state,
        queue_id: row.get(7)?,
    })
}
