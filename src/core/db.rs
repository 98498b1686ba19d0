use crate::core::error::StoreError;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// Busy timeout for every store connection, in seconds.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// Opens a writable connection, creating the file if needed.
pub fn db_connect(db_path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

/// Opens an existing store without write access.
pub fn db_connect_read_only(db_path: &Path) -> Result<Connection, StoreError> {
    if !db_path.is_file() {
        return Err(StoreError::NotFound(db_path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
    Ok(conn)
}

pub fn user_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version.max(0) as u32)
}

pub fn set_user_version(conn: &Connection, version: u32) -> Result<(), StoreError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    Ok(())
}
