use log::info;
use rusqlite::{params, Connection};

use crate::collab::PreparedJob;
use crate::param::value::JobContext;

impl PreparedJob {
    /// Insert a staged row for the job and return its id
    pub fn stage(&self, conn: &Connection, ctx: &JobContext) -> rusqlite::Result<i64> {
        let values = serde_json::to_string(&self.values)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        conn.execute(
            "INSERT INTO job (batch_id, user_id, lsid, params) VALUES (?1, ?2, ?3, ?4)",
            params![self.batch_id, ctx.user_id, self.input.lsid.to_string(), values],
        )?;
        let id = conn.last_insert_rowid();
        info!("Staged job {id} for {}", ctx.user_id);
        Ok(id)
    }
}
