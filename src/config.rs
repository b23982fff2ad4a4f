//! Logger configuration
//!
//! Plain data with `serde` derives so an external loader can produce it;
//! the field names follow the camelCase layout of service config files.

use crate::core::{LogLevel, LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default rotation threshold in megabytes when `max_size` is 0
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// Default write buffer capacity when `buf_size` is 0
pub const DEFAULT_BUF_SIZE: usize = 200 * 1024;

/// File output settings
///
/// # Example
///
/// ```
/// use logkit::config::FileLogConfig;
///
/// let file = FileLogConfig::new("/var/log/orders/app.log")
///     .with_max_size(50)
///     .with_max_backups(10)
///     .with_max_days(7);
///
/// assert_eq!(file.max_size_bytes(), 50 * 1024 * 1024);
/// assert_eq!(file.buffer_size(), 200 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileLogConfig {
    /// Base log file; empty disables file output entirely
    pub filename: String,
    /// Accepted for compatibility; rotation is always active
    pub log_rotate: bool,
    /// Rotation threshold in megabytes (0 = 100)
    pub max_size: u64,
    /// Delete backups older than this many days (0 = never)
    pub max_days: u32,
    /// Keep at most this many backups (0 = all)
    pub max_backups: usize,
    /// Write buffer capacity in bytes (0 = 200 KiB)
    pub buf_size: usize,
    /// Gzip rotated backups
    pub compress: bool,
}

impl FileLogConfig {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_log_rotate(mut self, enabled: bool) -> Self {
        self.log_rotate = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_size(mut self, megabytes: u64) -> Self {
        self.max_size = megabytes;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_days(mut self, days: u32) -> Self {
        self.max_days = days;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_buf_size(mut self, bytes: usize) -> Self {
        self.buf_size = bytes;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.filename.is_empty()
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.filename)
    }

    /// Directory holding the base file (`.` for bare file names)
    pub fn dir(&self) -> PathBuf {
        match self.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        let megabytes = if self.max_size == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            self.max_size
        };
        megabytes.saturating_mul(1024 * 1024)
    }

    pub fn buffer_size(&self) -> usize {
        if self.buf_size == 0 {
            DEFAULT_BUF_SIZE
        } else {
            self.buf_size
        }
    }

    /// Same settings pointed at `<dir>/error/<file_name>`
    pub fn sibling_in_error_dir(&self, file_name: &str) -> Self {
        let path = self.dir().join("error").join(file_name);
        self.clone().with_filename(path.to_string_lossy().into_owned())
    }
}

/// Logger configuration snapshot
///
/// # Example
///
/// ```
/// use logkit::config::{FileLogConfig, LogConfig};
/// use logkit::LogLevel;
///
/// let config = LogConfig::new("orders")
///     .with_level("debug")
///     .with_format("json")
///     .with_stdout(true)
///     .with_file(FileLogConfig::new("logs/orders.log"));
///
/// assert_eq!(config.level(), LogLevel::Debug);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogConfig {
    /// Rendered under the `app` key of every record
    pub service_name: String,
    /// Base level name; empty means `info`
    pub level: String,
    /// `"json"` or anything else for the console layout
    pub format: String,
    /// Also write the base stream to stdout
    pub stdout: bool,
    pub file: FileLogConfig,
}

impl LogConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_stdout(mut self, enabled: bool) -> Self {
        self.stdout = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_file(mut self, file: FileLogConfig) -> Self {
        self.file = file;
        self
    }

    /// Parse the configured level, defaulting to `info` when empty
    pub fn try_level(&self) -> Result<LogLevel> {
        if self.level.is_empty() {
            return Ok(LogLevel::Info);
        }
        self.level
            .parse()
            .map_err(|e: String| LoggerError::config("log level", e))
    }

    /// Parsed base level
    ///
    /// # Panics
    ///
    /// Panics on an unparseable level. A misconfigured level is a startup
    /// error; use [`LogConfig::try_level`] to validate beforehand.
    pub fn level(&self) -> LogLevel {
        match self.try_level() {
            Ok(level) => level,
            Err(e) => panic!("{}", e),
        }
    }
}
