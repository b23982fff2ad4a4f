//! Sink trait for physical log destinations

use super::error::Result;

/// A write target for encoded records
///
/// Sinks are shared between threads, so every method takes `&self` and the
/// implementation serializes access internally.
pub trait Sink: Send + Sync {
    /// Write one encoded record
    fn write(&self, buf: &[u8]) -> Result<()>;

    /// Push buffered bytes to the underlying destination
    fn flush(&self) -> Result<()>;

    /// Flush and release background resources; further writes may reopen
    fn close(&self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}
