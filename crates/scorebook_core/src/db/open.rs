//! Connection bootstrap utilities for project files.
//!
//! # Responsibility
//! - Open read-write project connections (file or in-memory) and migrate them.
//! - Open short-lived read-only connections used as scoped sheet storage.
//!
//! # Invariants
//! - Read-write connections have `foreign_keys=ON` and migrations applied.
//! - Read-only connections never create files and never migrate.

use super::migrations::{apply_migrations, latest_version};
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens (or creates) a project file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_logged("file", || Connection::open(path), bootstrap_connection)
}

/// Opens an in-memory project database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_logged("memory", Connection::open_in_memory, bootstrap_connection)
}

/// Opens an existing project file for reading only.
///
/// Fails with `DbError::MissingProject` when the file is absent and with
/// `DbError::OutdatedSchema` when it was not migrated to the current version.
pub fn open_db_read_only(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if !path.exists() {
        error!(
            "event=db_open module=db status=error mode=read_only error_code=project_missing path={}",
            path.display()
        );
        return Err(DbError::MissingProject(path.to_path_buf()));
    }
    open_logged(
        "read_only",
        || Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY),
        check_schema,
    )
}

fn open_logged(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
    bootstrap: impl FnOnce(&mut Connection) -> DbResult<()>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)?;
    Ok(())
}

fn check_schema(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    let db_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected = latest_version();
    if db_version != expected {
        return Err(DbError::OutdatedSchema {
            db_version,
            expected,
        });
    }
    Ok(())
}
