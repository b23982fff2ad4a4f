//! Core construction and process-wide installation
//!
//! A configuration expands into up to three cores:
//!
//! | core  | accepts            | sinks                                   |
//! |-------|--------------------|-----------------------------------------|
//! | base  | level and above    | `file.filename` (if set), stdout (if set) |
//! | error | exactly `error`    | `<dir>/error/error.log`                 |
//! | warn  | exactly `warn`     | `<dir>/error/warn.log`                  |
//!
//! The error and warn cores exist only when a base file is configured.

use crate::config::LogConfig;
use crate::core::{
    diagnostics, select_encoder, LevelFilter, LogCore, LogLevel, Logger, Result,
};
use crate::global::{redirect_log_facade, replace_global};
use crate::panic_capture::redirect_fatal_stream;
use crate::sinks::{ConsoleSink, RotatingFileSink};
use std::sync::atomic::{AtomicBool, Ordering};

pub const BASE_CORE: &str = "base";
pub const ERROR_CORE: &str = "error";
pub const WARN_CORE: &str = "warn";

/// Build the ordered core list for `cfg`, writing console output to stdout
///
/// # Panics
///
/// Panics when `cfg.level` is not a valid level name.
pub fn build_cores(cfg: &LogConfig) -> Result<Vec<LogCore>> {
    build_cores_with_console(cfg, ConsoleSink::stdout())
}

/// Build the ordered core list with a caller-supplied console sink
///
/// The console sink is attached to the base core only when `cfg.stdout` is set.
pub fn build_cores_with_console(cfg: &LogConfig, console: ConsoleSink) -> Result<Vec<LogCore>> {
    let level = cfg.level();
    let encoder = select_encoder(&cfg.format, false);

    let mut base = LogCore::new(BASE_CORE, encoder.clone(), LevelFilter::AtLeast(level));
    if cfg.file.is_enabled() {
        base.add_sink(Box::new(RotatingFileSink::new(&cfg.file)?));
    }
    if cfg.stdout {
        base.add_sink(Box::new(console));
    }

    let mut cores = vec![base];
    if cfg.file.is_enabled() {
        for (name, level, file_name) in [
            (ERROR_CORE, LogLevel::Error, "error.log"),
            (WARN_CORE, LogLevel::Warn, "warn.log"),
        ] {
            let file = cfg.file.sibling_in_error_dir(file_name);
            cores.push(
                LogCore::new(name, encoder.clone(), LevelFilter::Exactly(level))
                    .with_sink(RotatingFileSink::new(&file)?),
            );
        }
    }
    Ok(cores)
}

/// Build a logger for `cfg` without installing it
///
/// # Example
///
/// ```
/// use logkit::config::LogConfig;
/// use logkit::router::new_logger;
///
/// let logger = new_logger(&LogConfig::new("billing").with_level("warn")).unwrap();
/// assert_eq!(logger.name(), Some("billing"));
/// assert_eq!(logger.cores().len(), 1);
/// ```
pub fn new_logger(cfg: &LogConfig) -> Result<Logger> {
    new_logger_with_console(cfg, ConsoleSink::stdout())
}

pub fn new_logger_with_console(cfg: &LogConfig, console: ConsoleSink) -> Result<Logger> {
    let cores = build_cores_with_console(cfg, console)?;
    Ok(Logger::new(cores).named(&cfg.service_name))
}

/// Build the logger for `cfg` and install it process-wide
///
/// Replaces any previously installed logger, redirects the `log` facade at
/// the base level and captures stderr into `panic.log` next to the base file.
/// A failed capture is reported as a warning through the new logger.
pub fn init_logger(cfg: &LogConfig) -> Result<LoggerGuard> {
    init_logger_with_console(cfg, ConsoleSink::stdout())
}

pub fn init_logger_with_console(cfg: &LogConfig, console: ConsoleSink) -> Result<LoggerGuard> {
    let logger = new_logger_with_console(cfg, console)?;

    replace_global(logger.clone());
    redirect_log_facade(cfg.level());

    if let Err(e) = redirect_fatal_stream(&cfg.file.filename) {
        logger.warn(format!("panic capture disabled: {}", e));
    }

    Ok(LoggerGuard {
        logger,
        torn_down: AtomicBool::new(false),
    })
}

/// Handle for flushing and stopping the sinks of an installed logger
///
/// Dropping the guard does nothing; call [`LoggerGuard::teardown`] at shutdown.
#[must_use = "the guard is needed to flush the logger at shutdown"]
pub struct LoggerGuard {
    logger: Logger,
    torn_down: AtomicBool,
}

impl LoggerGuard {
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Flush every sink and stop background rotation
    ///
    /// Best-effort and idempotent: failures are reported on the diagnostic
    /// channel, never returned.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for core in self.logger.cores() {
            if let Err(e) = core.close() {
                diagnostics().report_sync_failure(core.name(), &e);
            }
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerGuard")
            .field("logger", &self.logger)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileLogConfig;
    use crate::core::Encoder;
    use crate::sinks::SharedBuffer;
    use tempfile::tempdir;

    fn core_names(cores: &[LogCore]) -> Vec<&str> {
        cores.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_stdout_only() {
        let cfg = LogConfig::new("svc").with_stdout(true);
        let cores = build_cores_with_console(&cfg, ConsoleSink::from_writer(SharedBuffer::new())).unwrap();

        assert_eq!(core_names(&cores), vec![BASE_CORE]);
        assert_eq!(cores[0].sink_names(), vec!["console"]);
        assert_eq!(cores[0].filter(), LevelFilter::AtLeast(LogLevel::Info));
        assert_eq!(cores[0].encoder(), &Encoder::Console { colorize: false });
    }

    #[test]
    fn test_stdout_only_creates_no_error_dir() {
        let error_dir = std::env::current_dir().unwrap().join("error");
        let existed = error_dir.exists();

        let cfg = LogConfig::new("svc").with_stdout(true);
        let cores = build_cores_with_console(&cfg, ConsoleSink::from_writer(SharedBuffer::new())).unwrap();

        assert!(!cfg.file.is_enabled());
        assert_eq!(cores.len(), 1);
        assert_eq!(error_dir.exists(), existed);
    }

    #[test]
    fn test_no_sinks_still_builds_base() {
        let cores = build_cores(&LogConfig::new("svc")).unwrap();
        assert_eq!(cores.len(), 1);
        assert!(cores[0].sink_names().is_empty());
    }

    #[test]
    fn test_file_config_adds_error_and_warn_cores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let cfg = LogConfig::new("svc")
            .with_level("debug")
            .with_format("json")
            .with_stdout(true)
            .with_file(FileLogConfig::new(path.to_string_lossy()));

        let cores = build_cores_with_console(&cfg, ConsoleSink::from_writer(SharedBuffer::new())).unwrap();

        assert_eq!(core_names(&cores), vec![BASE_CORE, ERROR_CORE, WARN_CORE]);
        assert_eq!(cores[0].sink_names(), vec!["rotating_file", "console"]);
        assert_eq!(cores[0].filter(), LevelFilter::AtLeast(LogLevel::Debug));
        assert_eq!(cores[1].filter(), LevelFilter::Exactly(LogLevel::Error));
        assert_eq!(cores[2].filter(), LevelFilter::Exactly(LogLevel::Warn));
        assert!(cores.iter().all(|c| c.encoder() == &Encoder::Json));

        assert!(path.exists());
        assert!(dir.path().join("error/error.log").exists());
        assert!(dir.path().join("error/warn.log").exists());

        for core in &cores {
            core.close().unwrap();
        }
    }

    #[test]
    #[should_panic(expected = "Invalid log level")]
    fn test_invalid_level_panics() {
        let _ = build_cores(&LogConfig::new("svc").with_level("chatty"));
    }

    #[test]
    fn test_unopenable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cfg = LogConfig::new("svc")
            .with_file(FileLogConfig::new(blocker.join("app.log").to_string_lossy()));

        assert!(build_cores(&cfg).is_err());
    }

    #[test]
    fn test_new_logger_is_named_and_not_installed() {
        let buffer = SharedBuffer::new();
        let cfg = LogConfig::new("svc").with_format("json").with_stdout(true);
        let logger = new_logger_with_console(&cfg, ConsoleSink::from_writer(buffer.clone())).unwrap();

        logger.info("direct");

        let record: serde_json::Value = serde_json::from_str(buffer.contents().trim_end()).unwrap();
        assert_eq!(record["app"], "svc");
        assert_eq!(record["msg"], "direct");
    }
}
