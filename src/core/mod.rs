//! Core logger types and traits

pub mod encoder;
pub mod error;
pub mod log_context;
pub mod log_core;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod sink;
pub mod timestamp;

pub use encoder::{select_encoder, Encoder};
pub use error::{LoggerError, Result};
pub use log_context::{Field, FieldValue, LogContext, NoticeTags};
pub use log_core::{LevelFilter, LogCore};
pub use log_entry::LogEntry;
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder};
pub use metrics::{diagnostics, LoggerMetrics};
pub use sink::Sink;
