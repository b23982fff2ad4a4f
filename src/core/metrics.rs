//! Logger metrics and the diagnostic channel
//!
//! Failures that must never reach the caller (background rotation, teardown
//! flushes, malformed notice arguments, task-id fallbacks, per-record sink
//! errors, span export failures) are counted here and reported on stderr.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use logkit::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_dropped();
/// metrics.record_logged();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.total_logged(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records that at least one core failed to write
    dropped_count: AtomicU64,

    /// Records written by every enabled core
    total_logged: AtomicU64,

    /// Failed rotations (size-triggered or scheduled)
    rotation_failures: AtomicU64,

    /// Failed flush/close calls during teardown
    sync_failures: AtomicU64,

    /// `append_notice` calls ignored because of malformed arguments
    malformed_notices: AtomicU64,

    /// Task ids that could not be read and fell back to 0
    task_id_fallbacks: AtomicU64,

    /// Span batches the exporter rejected
    export_failures: AtomicU64,

    /// Finished spans dropped because the export queue was full
    dropped_spans: AtomicU64,
}

static DIAGNOSTICS: LoggerMetrics = LoggerMetrics::new();

/// Process-wide diagnostic counters
pub fn diagnostics() -> &'static LoggerMetrics {
    &DIAGNOSTICS
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            total_logged: AtomicU64::new(0),
            rotation_failures: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            malformed_notices: AtomicU64::new(0),
            task_id_fallbacks: AtomicU64::new(0),
            export_failures: AtomicU64::new(0),
            dropped_spans: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rotation_failures(&self) -> u64 {
        self.rotation_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sync_failures(&self) -> u64 {
        self.sync_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn malformed_notices(&self) -> u64 {
        self.malformed_notices.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn task_id_fallbacks(&self) -> u64 {
        self.task_id_fallbacks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn export_failures(&self) -> u64 {
        self.export_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_spans(&self) -> u64 {
        self.dropped_spans.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_span(&self) -> u64 {
        self.dropped_spans.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_task_id_fallback(&self) -> u64 {
        self.task_id_fallbacks.fetch_add(1, Ordering::Relaxed)
    }

    /// Count and report a failed rotation
    pub fn report_rotation_failure(&self, error: &dyn Display) {
        self.rotation_failures.fetch_add(1, Ordering::Relaxed);
        eprintln!("[LOGGER WARNING] Log rotation failed: {}", error);
    }

    /// Count and report a failed flush or close
    pub fn report_sync_failure(&self, sink: &str, error: &dyn Display) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
        eprintln!("[LOGGER ERROR] Failed to sync sink '{}': {}", sink, error);
    }

    /// Count and report an ignored `append_notice` call
    pub fn report_malformed_notice(&self, reason: &str) {
        self.malformed_notices.fetch_add(1, Ordering::Relaxed);
        eprintln!("[LOGGER WARNING] append_notice ignored: {}", reason);
    }

    /// Count and report a span batch the exporter rejected
    pub fn report_export_failure(&self, spans: usize, error: &dyn Display) {
        self.export_failures.fetch_add(1, Ordering::Relaxed);
        eprintln!("[LOGGER WARNING] Failed to export {} spans: {}", spans, error);
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if no records have been processed.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.total_logged() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
