//! Fan-out logger over level-filtered cores

use super::{
    error::Result,
    log_context::{Field, LogContext},
    log_core::LogCore,
    log_entry::LogEntry,
    log_level::LogLevel,
    metrics::{diagnostics, LoggerMetrics},
};
use crate::context::ext_fields;
use opentelemetry::Context;
use std::panic::Location;
use std::sync::Arc;

/// Structured logger delivering every record to each core that accepts it
///
/// Cloning is cheap: cores are shared, only the accumulated fields are
/// copied. Derived loggers (`named`, `with`, `for_context`) write to the same
/// cores as their parent.
#[derive(Clone)]
pub struct Logger {
    cores: Arc<[LogCore]>,
    name: Option<Arc<str>>,
    context: LogContext,
    add_caller: bool,
}

impl Logger {
    #[must_use]
    pub fn new(cores: Vec<LogCore>) -> Self {
        Self {
            cores: cores.into(),
            name: None,
            context: LogContext::new(),
            add_caller: false,
        }
    }

    /// Logger with no cores; every record is discarded
    #[must_use]
    pub fn nop() -> Self {
        Self::new(Vec::new())
    }

    /// Set the name rendered under the `app` key (empty clears it)
    #[must_use]
    pub fn named(&self, name: &str) -> Self {
        let mut logger = self.clone();
        logger.name = if name.is_empty() { None } else { Some(Arc::from(name)) };
        logger
    }

    /// Child logger with extra fields attached to every record
    #[must_use]
    pub fn with<I: IntoIterator<Item = Field>>(&self, fields: I) -> Self {
        let mut logger = self.clone();
        logger.context.extend(fields);
        logger
    }

    /// Child logger annotating records with their call site
    #[must_use]
    pub fn with_caller(&self, enabled: bool) -> Self {
        let mut logger = self.clone();
        logger.add_caller = enabled;
        logger
    }

    /// Child logger carrying the trace, span, baggage-flow and task fields of `cx`
    #[must_use]
    pub fn for_context(&self, cx: &Context) -> Self {
        self.with_caller(true).with(ext_fields(cx))
    }

    pub fn cores(&self) -> &[LogCore] {
        &self.cores
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn fields(&self) -> &LogContext {
        &self.context
    }

    /// Whether any core would accept a record at `level`
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.cores.iter().any(|core| core.enabled(level))
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.log_with_context(level, message, LogContext::new());
    }

    /// Log with per-record fields appended after the logger's own
    #[track_caller]
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: LogContext,
    ) {
        if !self.enabled(level) {
            return;
        }

        let mut entry = LogEntry::new(level, message).with_name(self.name.clone());
        if self.add_caller {
            entry = entry.with_caller(Location::caller());
        }
        let mut fields = self.context.clone();
        fields.append(&context);
        self.dispatch(&entry.with_context(fields));
    }

    /// Deliver a fully built record; the logger's fields are prepended
    pub fn log_entry(&self, mut entry: LogEntry) {
        if !self.enabled(entry.level) {
            return;
        }
        if entry.name.is_none() {
            entry.name = self.name.clone();
        }
        if !self.context.is_empty() {
            let mut fields = self.context.clone();
            fields.append(&entry.context);
            entry.context = fields;
        }
        self.dispatch(&entry);
    }

    /// Write to every accepting core with per-core panic isolation
    ///
    /// A failing or panicking core never prevents the other cores from
    /// receiving the record.
    fn dispatch(&self, entry: &LogEntry) {
        let metrics = diagnostics();
        let mut has_error = false;

        for core in self.cores.iter().filter(|core| core.enabled(entry.level)) {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| core.write(entry)));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Core '{}' failed: {}", core.name(), e);
                    has_error = true;
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    eprintln!(
                        "[LOGGER CRITICAL] Core '{}' panicked: {}. \
                         Other cores continue to function.",
                        core.name(),
                        panic_msg
                    );
                    has_error = true;
                }
            }
        }

        if has_error {
            metrics.record_dropped();
        } else {
            metrics.record_logged();
        }
    }

    /// Process-wide diagnostic counters
    pub fn metrics(&self) -> &'static LoggerMetrics {
        diagnostics()
    }

    /// Flush every sink of every core, attempting all of them
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for core in self.cores.iter() {
            if let Err(e) = core.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flush and close every sink, stopping background rotation
    pub fn close(&self) -> Result<()> {
        let mut first_error = None;
        for core in self.cores.iter() {
            if let Err(e) = core.close() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Helper for structured info logging
    #[track_caller]
    pub fn info_with_context(&self, message: impl Into<String>, context: LogContext) {
        self.log_with_context(LogLevel::Info, message, context);
    }

    /// Helper for structured error logging
    #[track_caller]
    pub fn error_with_context(&self, message: impl Into<String>, context: LogContext) {
        self.log_with_context(LogLevel::Error, message, context);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::nop()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("cores", &self.cores)
            .field("fields", &self.context)
            .field("add_caller", &self.add_caller)
            .finish()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use logkit::prelude::*;
///
/// let logger = Logger::builder()
///     .name("billing")
///     .core(
///         LogCore::new("base", Encoder::Json, LevelFilter::AtLeast(LogLevel::Debug))
///             .with_sink(ConsoleSink::stdout()),
///     )
///     .caller(true)
///     .build();
///
/// assert!(logger.enabled(LogLevel::Debug));
/// ```
pub struct LoggerBuilder {
    name: Option<String>,
    cores: Vec<LogCore>,
    fields: Vec<Field>,
    add_caller: bool,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            name: None,
            cores: Vec::new(),
            fields: Vec::new(),
            add_caller: false,
        }
    }

    /// Set the logger name rendered under `app`
    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a core
    #[must_use = "builder methods return a new value"]
    pub fn core(mut self, core: LogCore) -> Self {
        self.cores.push(core);
        self
    }

    /// Add several cores, keeping their order
    #[must_use = "builder methods return a new value"]
    pub fn cores(mut self, cores: impl IntoIterator<Item = LogCore>) -> Self {
        self.cores.extend(cores);
        self
    }

    /// Add a field attached to every record
    #[must_use = "builder methods return a new value"]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Annotate records with their call site
    #[must_use = "builder methods return a new value"]
    pub fn caller(mut self, enabled: bool) -> Self {
        self.add_caller = enabled;
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        let logger = Logger::new(self.cores)
            .with(self.fields)
            .with_caller(self.add_caller);
        match self.name {
            Some(name) => logger.named(&name),
            None => logger,
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}
