use std::path::Path;

use log::info;
use rusqlite::Connection;

/// included schema, every statement is idempotent
static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));

pub fn open_db(path: &Path) -> rusqlite::Result<Connection> {
    if !path.exists() {
        info!("Creating new database {}", path.display())
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}
