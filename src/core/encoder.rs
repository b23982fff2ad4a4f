//! Record encoders
//!
//! Two layouts are supported:
//! - Json: one JSON object per line, for machine processing
//! - Console: tab-separated human-readable line, fields as a trailing JSON object
//!
//! Both share the same key set (`level`, `ts`, `app`, `caller`, `msg`) and
//! ISO 8601 timestamps.

use super::log_entry::LogEntry;
use super::timestamp::format_iso8601;
use colored::Colorize;

pub const LEVEL_KEY: &str = "level";
pub const TIME_KEY: &str = "ts";
pub const NAME_KEY: &str = "app";
pub const CALLER_KEY: &str = "caller";
pub const MESSAGE_KEY: &str = "msg";

/// Encoding strategy for a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoder {
    /// JSON format for machine processing
    ///
    /// Example: `{"level":"info","ts":"2025-01-08T10:30:45.123Z","app":"api","msg":"Request processed","gid":7}`
    Json,

    /// Human-readable console format
    ///
    /// Example: `2025-01-08T10:30:45.123Z	info	api	src/main.rs:12	Request processed	{"gid":7}`
    Console {
        /// Render level names with ANSI colors
        colorize: bool,
    },
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::Console { colorize: false }
    }
}

/// Pick the encoder for a configured format name
///
/// `"json"` selects [`Encoder::Json`]; every other value, including the empty
/// string and unknown names, falls back to the console encoder.
///
/// # Example
///
/// ```
/// use logkit::core::{select_encoder, Encoder};
///
/// assert_eq!(select_encoder("json", false), Encoder::Json);
/// assert_eq!(select_encoder("yaml", true), Encoder::Console { colorize: true });
/// ```
#[must_use]
pub fn select_encoder(format: &str, colorize: bool) -> Encoder {
    if format == "json" {
        Encoder::Json
    } else {
        Encoder::Console { colorize }
    }
}

/// Escape line breaks and tabs so a message cannot forge extra lines or
/// columns in the console layout
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

impl Encoder {
    /// Encode a record into a single line, including the trailing newline
    pub fn encode(&self, entry: &LogEntry) -> String {
        let mut line = match self {
            Encoder::Json => self.encode_json(entry),
            Encoder::Console { colorize } => self.encode_console(entry, *colorize),
        };
        line.push('\n');
        line
    }

    fn encode_json(&self, entry: &LogEntry) -> String {
        let mut json_obj = serde_json::Map::new();

        json_obj.insert(
            LEVEL_KEY.to_string(),
            serde_json::Value::String(entry.level.as_str().to_string()),
        );
        json_obj.insert(
            TIME_KEY.to_string(),
            serde_json::Value::String(format_iso8601(&entry.timestamp)),
        );
        if let Some(ref name) = entry.name {
            json_obj.insert(
                NAME_KEY.to_string(),
                serde_json::Value::String(name.to_string()),
            );
        }
        if let Some(ref caller) = entry.caller {
            json_obj.insert(
                CALLER_KEY.to_string(),
                serde_json::Value::String(caller.clone()),
            );
        }
        json_obj.insert(
            MESSAGE_KEY.to_string(),
            serde_json::Value::String(entry.message.clone()),
        );

        for (key, value) in entry.context.iter() {
            json_obj.insert(key.to_string(), value.to_json_value());
        }

        serde_json::to_string(&serde_json::Value::Object(json_obj)).unwrap_or_default()
    }

    fn encode_console(&self, entry: &LogEntry, colorize: bool) -> String {
        let level = if colorize {
            entry
                .level
                .as_str()
                .color(entry.level.color_code())
                .to_string()
        } else {
            entry.level.as_str().to_string()
        };

        let mut parts = vec![format_iso8601(&entry.timestamp), level];
        if let Some(ref name) = entry.name {
            parts.push(name.to_string());
        }
        if let Some(ref caller) = entry.caller {
            parts.push(caller.clone());
        }
        parts.push(sanitize_message(&entry.message));

        if !entry.context.is_empty() {
            let fields: serde_json::Map<String, serde_json::Value> = entry
                .context
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_json_value()))
                .collect();
            parts.push(serde_json::Value::Object(fields).to_string());
        }

        parts.join("\t")
    }
}
