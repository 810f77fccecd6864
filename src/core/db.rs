use crate::core::error::ScaffoldError;
use crate::core::schemas;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT_SECS: u64 = 5;

/// Open the catalog for reading. A missing or unreadable file is reported as
/// `StoreUnavailable`; SQLite is never allowed to create it here.
pub fn catalog_connect(db_path: &Path) -> Result<Connection, ScaffoldError> {
    let unavailable = |source| ScaffoldError::StoreUnavailable {
        path: db_path.to_path_buf(),
        source,
    };
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(unavailable)?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
        .map_err(unavailable)?;
    Ok(conn)
}

/// Create the catalog file and its tables. Safe to run repeatedly.
pub fn initialize_catalog(db_path: &Path) -> Result<(), ScaffoldError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(ScaffoldError::IoError)?;
    }
    let conn = Connection::open(db_path).map_err(|source| ScaffoldError::StoreUnavailable {
        path: db_path.to_path_buf(),
        source,
    })?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    for stmt in schemas::catalog_schema() {
        conn.execute(stmt, [])?;
    }
    Ok(())
}
