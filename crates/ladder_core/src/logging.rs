//! Catalog logging bootstrap.
//!
//! # Responsibility
//! - Start rolling file logs from the `[logging]` table once per process.
//! - Record which catalog configuration a process runs with.
//!
//! # Invariants
//! - Initialization is idempotent for the same directory and level.
//! - A second initialization with another directory or level is rejected
//!   and leaves the active logger untouched.
//! - Initialization never panics.

use crate::config::{CatalogConfig, LoggingConfig};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "ladder-catalog";

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    status: LoggingStatus,
    _handle: LoggerHandle,
}

/// Level and directory of the running logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingStatus {
    pub level: &'static str,
    pub dir: PathBuf,
}

impl Display for LoggingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "level `{}` at `{}`", self.level, self.dir.display())
    }
}

#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDir(String),
    CreateDir { dir: PathBuf, source: std::io::Error },
    Backend(String),
    AlreadyActive {
        active: LoggingStatus,
        requested: LoggingStatus,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDir(message) => write!(f, "invalid log dir: {message}"),
            Self::CreateDir { dir, source } => {
                write!(f, "cannot create log dir `{}`: {source}", dir.display())
            }
            Self::Backend(message) => write!(f, "failed to start logger: {message}"),
            Self::AlreadyActive { active, requested } => write!(
                f,
                "logging already initialized with {active}; refusing to switch to {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Starts file logging from the `[logging]` table.
///
/// Returns `Ok(None)` without touching the logger when no directory is
/// configured, otherwise the status of the active logger.
///
/// # Errors
/// - `UnsupportedLevel` and `InvalidDir` for bad settings.
/// - `CreateDir` and `Backend` when the log files cannot be opened.
/// - `AlreadyActive` when another directory or level is already running.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<LoggingStatus>, LoggingError> {
    let Some(dir) = &config.dir else {
        return Ok(None);
    };
    let requested = LoggingStatus {
        level: normalize_level(&config.level)?,
        dir: normalize_log_dir(dir)?,
    };

    let active = ACTIVE.get_or_try_init(|| start(&requested, config))?;
    if active.status != requested {
        return Err(LoggingError::AlreadyActive {
            active: active.status.clone(),
            requested,
        });
    }
    Ok(Some(active.status.clone()))
}

fn start(status: &LoggingStatus, config: &LoggingConfig) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&status.dir).map_err(|source| LoggingError::CreateDir {
        dir: status.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(status.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(status.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(config.max_file_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.keep_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        // [YYYY-MM-DD HH:MM:SS.ffffff TZ] LEVEL [module] file:line: message
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} max_file_bytes={} keep_files={}",
        status.level,
        status.dir.display(),
        config.max_file_bytes,
        config.keep_files
    );
    Ok(ActiveLogger {
        status: status.clone(),
        _handle: handle,
    })
}

/// Logs the settings a catalog process starts with.
pub fn log_catalog_start(config: &CatalogConfig) {
    let tenants: Vec<&str> = config.tenants.iter().map(|tenant| tenant.id.as_str()).collect();
    info!(
        "event=catalog_start module=logging status=ok version={} base_uri={} tenants={} min_score={} limit={} max_attempts={}",
        env!("CARGO_PKG_VERSION"),
        config.base_uri,
        tenants.join(","),
        config.search.min_score,
        config.search.limit,
        config.jobs.max_attempts
    );
}

pub fn logging_status() -> Option<LoggingStatus> {
    ACTIVE.get().map(|active| active.status.clone())
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn normalize_log_dir(dir: &Path) -> Result<PathBuf, LoggingError> {
    if dir.as_os_str().is_empty() {
        return Err(LoggingError::InvalidDir("path is empty".to_string()));
    }
    if !dir.is_absolute() {
        return Err(LoggingError::InvalidDir(format!(
            "`{}` is not absolute",
            dir.display()
        )));
    }
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, normalize_level, normalize_log_dir, LoggingError};
    use crate::config::LoggingConfig;
    use std::path::Path;

    fn config(level: &str, dir: &Path) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            dir: Some(dir.to_path_buf()),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn levels_are_normalized() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert!(matches!(
            normalize_level("loud"),
            Err(LoggingError::UnsupportedLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn relative_dirs_are_rejected() {
        let err = normalize_log_dir(Path::new("logs/dev")).unwrap_err();
        assert!(err.to_string().contains("not absolute"));
    }

    #[test]
    fn config_without_dir_leaves_logging_off() {
        assert!(init_logging(&LoggingConfig::default()).unwrap().is_none());
    }

    #[test]
    fn second_init_is_idempotent_and_rejects_conflicts() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let status = init_logging(&config("info", first.path())).unwrap().unwrap();
        assert_eq!(status.level, "info");
        assert_eq!(init_logging(&config("INFO", first.path())).unwrap(), Some(status.clone()));

        let err = init_logging(&config("debug", first.path())).unwrap_err();
        assert!(matches!(err, LoggingError::AlreadyActive { .. }));
        let err = init_logging(&config("info", second.path())).unwrap_err();
        assert!(err.to_string().contains("refusing to switch"));

        assert_eq!(logging_status(), Some(status));
    }
}
