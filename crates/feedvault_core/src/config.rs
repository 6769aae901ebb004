//! Store configuration.
//!
//! # Responsibility
//! - Describe where the database lives and how the store starts.
//! - Carry logging preferences for hosts that initialize core logging.
//!
//! # Invariants
//! - `db_path` is never empty after validation.

use crate::db::StartupMode;
use crate::logging::{default_log_level, init_logging, LoggingError};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE: &str = "feedvault.db";

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid store options: {err}"),
            Self::Invalid(message) => write!(f, "invalid store options: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Options for [`crate::store::EntityStore::open`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    pub db_path: PathBuf,
    /// Requested mode. A stale session marker upgrades it to emergency.
    pub startup_mode: StartupMode,
    /// `None` uses the build-mode default.
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            startup_mode: StartupMode::Normal,
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreOptions {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_startup_mode(mut self, startup_mode: StartupMode) -> Self {
        self.startup_mode = startup_mode;
        self
    }

    /// Parses and validates options from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Configured log level, or the build-mode default.
    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }

    /// Starts file logging when `log_dir` is set. Returns whether logging
    /// was requested.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(log_dir) = self.log_dir.as_deref() else {
            return Ok(false);
        };
        let log_dir = log_dir.to_str().ok_or_else(|| {
            LoggingError::InvalidDirectory(format!(
                "log_dir must be valid UTF-8, got `{}`",
                log_dir.display()
            ))
        })?;
        init_logging(self.effective_log_level(), log_dir)?;
        Ok(true)
    }
}
