//! Core configuration, passed explicitly to whoever needs it.
//!
//! # Responsibility
//! - Deserialize logging, book-default, edit and view settings from JSON.
//! - Validate values before they reach books or the logger.

use crate::book::sqlite_book::BookDefaults;
use crate::logging::{default_log_level, parse_level, LoggingError};
use crate::model::params::{normalize_language, ParamError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    Logging(LoggingError),
    Param(ParamError),
    ZeroHistoryLimit,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Json(err) => write!(f, "invalid config: {err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Param(err) => write!(f, "{err}"),
            Self::ZeroHistoryLimit => write!(f, "edit.history_limit must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Param(err) => Some(err),
            Self::ZeroHistoryLimit => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<ParamError> for ConfigError {
    fn from(value: ParamError) -> Self {
        Self::Param(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// No file logging when absent.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Undo depth of each sheet; unbounded when absent.
    pub history_limit: Option<usize>,
}

/// Presentation toggles consulted by the core when selecting what to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParameters {
    /// Show sheets flagged as containing no music.
    pub invalid_sheet_display: bool,
    pub letter_box_painting: bool,
    pub staff_line_painting: bool,
    pub attachment_painting: bool,
    pub selection_painting: bool,
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            invalid_sheet_display: false,
            letter_box_painting: true,
            staff_line_painting: true,
            attachment_painting: false,
            selection_painting: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub book: BookDefaults,
    pub edit: EditConfig,
    pub view: ViewParameters,
}

impl CoreConfig {
    /// Parses and validates a JSON config; missing sections take defaults.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let mut config: CoreConfig = serde_json::from_str(text)?;
        config.logging.level = parse_level(&config.logging.level)?.to_string();
        config.book.language = normalize_language(&config.book.language)?;
        if config.edit.history_limit == Some(0) {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
