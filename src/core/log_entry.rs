//! Log entry structure

use super::log_context::LogContext;
use super::log_level::LogLevel;
use chrono::{DateTime, Local};
use std::panic::Location;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
    /// Logger name, rendered under the `app` key
    pub name: Option<Arc<str>>,
    /// `file:line` of the call site
    pub caller: Option<String>,
    pub context: LogContext,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Local::now(),
            name: None,
            caller: None,
            context: LogContext::new(),
        }
    }

    pub fn with_name(mut self, name: Option<Arc<str>>) -> Self {
        self.name = name;
        self
    }

    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.caller = Some(format!("{}:{}", file, line));
        self
    }

    pub fn with_caller(self, location: &Location<'_>) -> Self {
        self.with_location(location.file(), location.line())
    }

    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = context;
        self
    }
}
