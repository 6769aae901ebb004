//! Unclean-shutdown detection and emergency recovery.
//!
//! # Responsibility
//! - Write a session marker next to the database while a store is open.
//! - Detect a marker left behind by a process that never shut down.
//! - Verify and re-index the database before an emergency start.
//!
//! # Invariants
//! - The marker exists exactly while a file-backed store is open.
//! - Recovery never rewrites application rows; it only checks and rebuilds
//!   indexes.

use super::{DbError, DbResult};
use log::{info, warn};
use rusqlite::Connection;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MARKER_SUFFIX: &str = "session";

/// How a store is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    #[default]
    Normal,
    /// Runs integrity check and re-index before the store is used.
    Emergency,
}

impl StartupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Emergency => "emergency",
        }
    }
}

/// Marker file proving that a session is in progress.
#[derive(Debug)]
pub struct SessionMarker {
    path: PathBuf,
    session_id: Uuid,
}

impl SessionMarker {
    /// Writes a fresh marker for `db_path`.
    ///
    /// Returns the marker and whether a stale marker from an earlier session
    /// was found (the previous process did not shut down cleanly).
    pub fn acquire(db_path: &Path) -> DbResult<(Self, bool)> {
        let path = marker_path(db_path);
        let stale = path.exists();
        if stale {
            let previous = fs::read_to_string(&path).unwrap_or_default();
            warn!(
                "event=session_marker module=db status=stale previous_session={}",
                previous.trim()
            );
        }

        let session_id = Uuid::new_v4();
        fs::write(&path, session_id.to_string())?;
        info!("event=session_marker module=db status=acquired session={session_id}");
        Ok((Self { path, session_id }, stale))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the marker after a clean shutdown.
    pub fn release(self) -> DbResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(DbError::Io(err)),
        }
        info!(
            "event=session_marker module=db status=released session={}",
            self.session_id
        );
        Ok(())
    }
}

/// Returns the marker location used for `db_path`.
pub fn marker_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(MARKER_SUFFIX);
    db_path.with_file_name(name)
}

/// Verifies database integrity and rebuilds every index.
pub fn run_recovery(conn: &Connection) -> DbResult<()> {
    warn!("event=db_recovery module=db status=start");

    let mut stmt = conn.prepare("PRAGMA integrity_check;")?;
    let report = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if report.len() != 1 || report[0] != "ok" {
        let joined = report.join("; ");
        warn!("event=db_recovery module=db status=error error_code=integrity_check_failed");
        return Err(DbError::IntegrityCheckFailed(joined));
    }

    conn.execute_batch("REINDEX;")?;
    info!("event=db_recovery module=db status=ok");
    Ok(())
}
