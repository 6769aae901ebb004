//! SQLite storage bootstrap, schema migrations and crash recovery.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the feed store.
//! - Apply schema migrations in deterministic order.
//! - Track clean shutdown with a session marker and run recovery on the
//!   next start when the marker was left behind.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Store code must not read/write application data before migrations
//!   succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
pub mod recovery;

pub use open::{open_db, open_db_in_memory};
pub use recovery::{run_recovery, SessionMarker, StartupMode};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Session marker could not be written or removed.
    Io(std::io::Error),
    /// `PRAGMA integrity_check` reported a damaged database.
    IntegrityCheckFailed(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Io(err) => write!(f, "session marker io failed: {err}"),
            Self::IntegrityCheckFailed(report) => {
                write!(f, "database integrity check failed: {report}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::IntegrityCheckFailed(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
