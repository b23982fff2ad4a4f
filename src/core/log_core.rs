//! Level-filtered, encoder-bound fan-out units

use super::encoder::Encoder;
use super::error::{LoggerError, Result};
use super::log_entry::LogEntry;
use super::log_level::LogLevel;
use super::sink::Sink;

/// Decides which levels a core accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Accept `level` and everything more severe
    AtLeast(LogLevel),
    /// Accept exactly `level`
    Exactly(LogLevel),
}

impl LevelFilter {
    #[inline]
    pub fn accepts(&self, level: LogLevel) -> bool {
        match self {
            LevelFilter::AtLeast(min) => level >= *min,
            LevelFilter::Exactly(only) => level == *only,
        }
    }

    /// Least severe level this filter can accept
    pub fn min_level(&self) -> LogLevel {
        match self {
            LevelFilter::AtLeast(level) | LevelFilter::Exactly(level) => *level,
        }
    }
}

/// One or more sinks sharing a level filter and an encoder
///
/// A record accepted by the filter is encoded once and written to every sink.
///
/// # Example
///
/// ```
/// use logkit::core::{Encoder, LevelFilter, LogCore, LogLevel};
/// use logkit::sinks::ConsoleSink;
///
/// let core = LogCore::new("warn", Encoder::Json, LevelFilter::Exactly(LogLevel::Warn))
///     .with_sink(ConsoleSink::stdout());
///
/// assert!(core.enabled(LogLevel::Warn));
/// assert!(!core.enabled(LogLevel::Error));
/// ```
pub struct LogCore {
    name: String,
    encoder: Encoder,
    filter: LevelFilter,
    sinks: Vec<Box<dyn Sink>>,
}

impl LogCore {
    pub fn new(name: impl Into<String>, encoder: Encoder, filter: LevelFilter) -> Self {
        Self {
            name: name.into(),
            encoder,
            filter,
            sinks: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn filter(&self) -> LevelFilter {
        self.filter
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.filter.accepts(level)
    }

    /// Encode and write a record to every sink
    ///
    /// Every sink is attempted; the first failure is returned. Records at
    /// `error` and above are flushed before returning.
    pub fn write(&self, entry: &LogEntry) -> Result<()> {
        let line = self.encoder.encode(entry);
        let flush = entry.level >= LogLevel::Error;
        let mut first_error = None;
        for sink in &self.sinks {
            let written = sink
                .write(line.as_bytes())
                .and_then(|()| if flush { sink.flush() } else { Ok(()) });
            if let Err(e) = written {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flush every sink, attempting all of them
    pub fn flush(&self) -> Result<()> {
        self.for_each_sink("flush", |sink| sink.flush())
    }

    /// Close every sink, attempting all of them
    pub fn close(&self) -> Result<()> {
        self.for_each_sink("close", |sink| sink.close())
    }

    fn for_each_sink(&self, op: &str, f: impl Fn(&dyn Sink) -> Result<()>) -> Result<()> {
        let mut failed = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                failed.push(format!("{}: {}", sink.name(), e));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::writer(format!(
                "core '{}' {} failed: {}",
                self.name,
                op,
                failed.join("; ")
            )))
        }
    }
}

impl std::fmt::Debug for LogCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCore")
            .field("name", &self.name)
            .field("encoder", &self.encoder)
            .field("filter", &self.filter)
            .field("sinks", &self.sink_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::console::{ConsoleSink, SharedBuffer};

    #[test]
    fn test_at_least_filter() {
        let filter = LevelFilter::AtLeast(LogLevel::Info);
        assert!(!filter.accepts(LogLevel::Debug));
        assert!(filter.accepts(LogLevel::Info));
        assert!(filter.accepts(LogLevel::Fatal));
    }

    #[test]
    fn test_exact_filter() {
        let filter = LevelFilter::Exactly(LogLevel::Error);
        assert!(!filter.accepts(LogLevel::Warn));
        assert!(filter.accepts(LogLevel::Error));
        assert!(!filter.accepts(LogLevel::Fatal));
    }

    #[test]
    fn test_write_fans_out_to_all_sinks() {
        let first = SharedBuffer::new();
        let second = SharedBuffer::new();
        let core = LogCore::new("base", Encoder::Json, LevelFilter::AtLeast(LogLevel::Info))
            .with_sink(ConsoleSink::from_writer(first.clone()))
            .with_sink(ConsoleSink::from_writer(second.clone()));

        core.write(&LogEntry::new(LogLevel::Info, "fan out")).unwrap();

        assert!(first.contents().contains("fan out"));
        assert_eq!(first.contents(), second.contents());
    }

    struct CountingSink {
        flushes: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Sink for CountingSink {
        fn write(&self, _buf: &[u8]) -> Result<()> {
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            self.flushes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_error_records_are_flushed_immediately() {
        let flushes = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let core = LogCore::new("base", Encoder::Json, LevelFilter::AtLeast(LogLevel::Info))
            .with_sink(CountingSink {
                flushes: flushes.clone(),
            });

        core.write(&LogEntry::new(LogLevel::Info, "buffered")).unwrap();
        core.write(&LogEntry::new(LogLevel::Warn, "buffered")).unwrap();
        assert_eq!(flushes.load(std::sync::atomic::Ordering::Relaxed), 0);

        core.write(&LogEntry::new(LogLevel::Error, "flushed")).unwrap();
        core.write(&LogEntry::new(LogLevel::Fatal, "flushed")).unwrap();
        assert_eq!(flushes.load(std::sync::atomic::Ordering::Relaxed), 2);
    }

    #[test]
    fn test_debug_lists_sinks() {
        let core = LogCore::new("base", Encoder::Json, LevelFilter::AtLeast(LogLevel::Info))
            .with_sink(ConsoleSink::stdout());
        let debug = format!("{:?}", core);
        assert!(debug.contains("console"));
    }
}
