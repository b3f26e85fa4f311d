use std::path::Path;

use log::info;
use rusqlite::{params, Connection};

use crate::db::job::state::JobState;

pub fn update_state(conn: &Connection, job_id: i64, state: JobState) -> rusqlite::Result<()> {
    info!("Updating {job_id} with state {state}");
    conn.execute("UPDATE job SET state = ?1 WHERE id = ?2", params![state.as_str(), job_id])?;
    Ok(())
}

pub fn update_working_dir(conn: &Connection, job_id: i64, working_dir: &Path) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE job SET working_dir = ?1 WHERE id = ?2",
        params![working_dir.to_string_lossy().to_string(), job_id],
    )?;
    Ok(())
}

/// The job was accepted by the queue
pub fn submitted(conn: &Connection, job_id: i64, queue_id: &str) -> rusqlite::Result<()> {
    info!("Updating {job_id} with queue id {queue_id}");
    update_state(conn, job_id, JobState::Submitted)?;
    conn.execute("UPDATE job SET queue_id = ?1 WHERE id = ?2", params![queue_id, job_id])?;
    Ok(())
}
