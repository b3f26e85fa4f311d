use std::fs;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection};

use crate::collab::UploadCatalog;
use crate::resolve::handle::FileHandle;

/// One row of the upload catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub user_id: String,
    pub path: String,
    pub name: String,
    pub length: u64,
    pub extension: String,
    pub kind: String,
    pub last_modified: String,
}

/// Upload catalog in the `upload_file` table
///
/// Registering the same (user, path) twice leaves the first row untouched.
pub struct SqliteUploadCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUploadCatalog {
    pub fn new(conn: Arc<Mutex<Connection>>) -> SqliteUploadCatalog {
        SqliteUploadCatalog { conn }
    }

    pub fn uploads(&self, user_id: &str) -> Result<Vec<UploadRecord>> {
        let conn = self.conn.lock().map_err(|_| anyhow!("Database connection lock poisoned"))?;
        let mut stmt = conn.prepare(
            "SELECT user_id, path, name, length, extension, kind, last_modified
             FROM upload_file WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(UploadRecord {
                user_id: row.get(0)?,
                path: row.get(1)?,
                name: row.get(2)?,
                length: row.get::<_, i64>(3)? as u64,
                extension: row.get(4)?,
                kind: row.get(5)?,
                last_modified: row.get(6)?,
            })
        })?;
        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?);
        }
        Ok(uploads)
    }
}

impl UploadCatalog for SqliteUploadCatalog {
    fn register_upload(&self, user_id: &str, handle: &FileHandle) -> Result<bool> {
        let path = handle.server_path.as_deref().ok_or_else(|| anyhow!("Only server files can be registered"))?;
        let last_modified: DateTime<Utc> = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        let conn = self.conn.lock().map_err(|_| anyhow!("Database connection lock poisoned"))?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO upload_file (user_id, path, name, length, extension, kind, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                path.to_string_lossy().to_string(),
                handle.name().unwrap_or_default(),
                handle.file_length() as i64,
                handle.extension(),
                handle.kind(),
                last_modified.to_rfc3339(),
            ],
        )?;
        if inserted > 0 {
            info!("Registered upload {} for {user_id}", path.display());
        }
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open::open_in_memory;
    use crate::resolve::layout::StorageLayout;

    #[test]
    fn registration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(&dir.path().join("users"), &dir.path().join("cache"));
        let handle = layout.upload_file("alice", std::path::Path::new("tmp/external/example.org/a.GCT"));
        let path = handle.server_path.clone().unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "12345").unwrap();

        let catalog = SqliteUploadCatalog::new(Arc::new(Mutex::new(open_in_memory().unwrap())));
        assert!(catalog.register_upload("alice", &handle).unwrap());
        assert!(!catalog.register_upload("alice", &handle).unwrap());
        assert!(catalog.register_upload("bob", &handle).unwrap());

        let uploads = catalog.uploads("alice").unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].name, "a.GCT");
        assert_eq!(uploads[0].length, 5);
        assert_eq!(uploads[0].kind, "gct");
    }

    #[test]
    fn external_handles_are_rejected() {
        let catalog = SqliteUploadCatalog::new(Arc::new(Mutex::new(open_in_memory().unwrap())));
        let handle = FileHandle::external(url::Url::parse("https://example.org/a.gct").unwrap());
        assert!(catalog.register_upload("alice", &handle).is_err());
    }
}
