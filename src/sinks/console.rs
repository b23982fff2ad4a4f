//! Console sink
//!
//! Writes encoded records to stdout, or to any writer supplied by the host.

use crate::core::{LoggerError, Result, Sink};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Sink writing to the process stdout
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Sink writing to a caller-supplied stream
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, buf: &[u8]) -> Result<()> {
        self.writer
            .lock()
            .write_all(buf)
            .map_err(|e| LoggerError::writer(format!("console write failed: {}", e)))
    }

    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| LoggerError::writer(format!("console flush failed: {}", e)))
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// Cloneable in-memory writer for capturing console output
///
/// # Example
///
/// ```
/// use logkit::sinks::{ConsoleSink, SharedBuffer};
/// use logkit::core::Sink;
///
/// let buffer = SharedBuffer::new();
/// let sink = ConsoleSink::from_writer(buffer.clone());
/// sink.write(b"hello\n").unwrap();
///
/// assert_eq!(buffer.contents(), "hello\n");
/// ```
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
