//! Process-wide logger and the `log` facade bridge
//!
//! The installed logger is swapped atomically: readers always see either the
//! previous logger or the new one, never a partially built one.

use crate::core::{LogContext, LogEntry, LogLevel, Logger};
use arc_swap::ArcSwapOption;
use opentelemetry::Context;
use std::sync::{Arc, Once};

static GLOBAL: ArcSwapOption<Logger> = ArcSwapOption::const_empty();

/// The installed logger, or a no-op logger before initialization
pub fn global() -> Logger {
    match &*GLOBAL.load() {
        Some(logger) => Logger::clone(logger),
        None => Logger::nop(),
    }
}

/// Whether a logger has been installed
pub fn is_installed() -> bool {
    GLOBAL.load().is_some()
}

/// Install `logger` as the process-wide logger, returning the previous one
pub fn replace_global(logger: Logger) -> Option<Arc<Logger>> {
    GLOBAL.swap(Some(Arc::new(logger)))
}

/// Global logger annotated with call sites and the request fields of `cx`
///
/// # Example
///
/// ```
/// use logkit::global::logger_for;
/// use opentelemetry::Context;
///
/// let logger = logger_for(&Context::new());
/// logger.info("handled request");
/// ```
pub fn logger_for(cx: &Context) -> Logger {
    global().for_context(cx)
}

/// Forwards `log` crate records to the installed logger
struct LogBridge;

const TARGET_KEY: &str = "target";

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        match &*GLOBAL.load() {
            Some(logger) => logger.enabled(LogLevel::from(metadata.level())),
            None => false,
        }
    }

    fn log(&self, record: &log::Record) {
        let guard = GLOBAL.load();
        let Some(logger) = &*guard else {
            return;
        };

        let level = LogLevel::from(record.level());
        if !logger.enabled(level) {
            return;
        }

        let mut entry = LogEntry::new(level, record.args().to_string())
            .with_context(LogContext::new().with_field(TARGET_KEY, record.target()));
        if let (Some(file), Some(line)) = (record.file(), record.line()) {
            entry = entry.with_location(file, line);
        }
        logger.log_entry(entry);
    }

    fn flush(&self) {
        if let Some(logger) = &*GLOBAL.load() {
            if let Err(e) = logger.flush() {
                eprintln!("[LOGGER ERROR] Failed to flush log facade records: {}", e);
            }
        }
    }
}

static BRIDGE: LogBridge = LogBridge;
static BRIDGE_INIT: Once = Once::new();

/// Route `log` crate records at or above `level` through the global logger
///
/// The facade accepts one logger per process; when another one is already
/// registered the redirect is skipped with a warning.
pub fn redirect_log_facade(level: LogLevel) {
    BRIDGE_INIT.call_once(|| {
        if let Err(e) = log::set_logger(&BRIDGE) {
            eprintln!("[LOGGER WARNING] log facade not redirected: {}", e);
        }
    });
    log::set_max_level(level.to_log_filter());
}
