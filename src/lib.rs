//! # logkit
//!
//! Multi-sink structured logging and trace-context plumbing for backend
//! services.
//!
//! ## Features
//!
//! - **Level-split routing**: one base stream plus dedicated `error` and `warn`
//!   files next to it
//! - **Rotation**: size-triggered and hourly rotation with age and count
//!   retention, optional gzip
//! - **Request context**: trace id, span id, baggage flow and task id attached
//!   from an [`opentelemetry::Context`]
//! - **Process integration**: global logger, `log` facade redirect, stderr
//!   capture into `panic.log`
//!
//! ## Example
//!
//! ```no_run
//! use logkit::config::{FileLogConfig, LogConfig};
//! use logkit::global::logger_for;
//! use logkit::router::init_logger;
//! use opentelemetry::Context;
//!
//! let config = LogConfig::new("orders")
//!     .with_format("json")
//!     .with_stdout(true)
//!     .with_file(FileLogConfig::new("/var/log/orders/app.log").with_max_backups(7));
//!
//! let guard = init_logger(&config).unwrap();
//! logger_for(&Context::current()).info("order accepted");
//! guard.teardown();
//! ```

pub mod macros;

pub mod config;
pub mod context;
pub mod core;
pub mod global;
pub mod panic_capture;
pub mod router;
pub mod secrecy;
pub mod sinks;
pub mod trace;

pub mod prelude {
    pub use crate::config::{FileLogConfig, LogConfig};
    pub use crate::context::{append_notice, ext_fields, IncomingMetadata};
    pub use crate::core::{
        Encoder, Field, FieldValue, LevelFilter, LogContext, LogCore, LogEntry, LogLevel, Logger,
        LoggerBuilder, LoggerError, LoggerMetrics, Result, Sink,
    };
    pub use crate::global::{global, logger_for};
    pub use crate::router::{init_logger, new_logger, LoggerGuard};
    pub use crate::secrecy::{is_secrecy_msg, BytePayload, JsonPayload};
    pub use crate::sinks::{ConsoleSink, RotatingFileSink};
}

pub use config::{FileLogConfig, LogConfig};
pub use core::{
    diagnostics, Encoder, Field, FieldValue, LevelFilter, LogContext, LogCore, LogEntry, LogLevel,
    Logger, LoggerBuilder, LoggerError, LoggerMetrics, NoticeTags, Result, Sink,
};
pub use global::{global, logger_for, replace_global};
pub use router::{build_cores, init_logger, new_logger, LoggerGuard};
