//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. They accept any
//! [`Logger`](crate::Logger), including the context loggers returned by
//! [`logger_for`](crate::global::logger_for).
//!
//! # Examples
//!
//! ```
//! use logkit::prelude::*;
//! use logkit::info;
//!
//! let logger = Logger::nop();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use logkit::prelude::*;
/// # let logger = Logger::nop();
/// use logkit::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use logkit::prelude::*;
/// # let logger = Logger::nop();
/// use logkit::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message. The process keeps running.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

/// Record alternating keys and values on a context's notice bag.
///
/// Each argument is converted with `FieldValue::from`; see
/// [`append_notice`](crate::context::append_notice) for the rules.
///
/// # Examples
///
/// ```
/// use logkit::append_notice;
/// use logkit::context::{notice_fields, with_notice_tags};
/// use opentelemetry::Context;
///
/// let cx = with_notice_tags(&Context::new());
/// append_notice!(&cx, "user", "ada", "attempt", 2_i64);
///
/// assert_eq!(notice_fields(&cx).len(), 2);
/// ```
#[macro_export]
macro_rules! append_notice {
    ($cx:expr $(, $arg:expr)* $(,)?) => {
        $crate::context::append_notice($cx, &[$($crate::core::FieldValue::from($arg)),*])
    };
}
