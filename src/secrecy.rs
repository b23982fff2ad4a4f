//! Payload wrappers and the secret-content check
//!
//! The logger never redacts on its own. Callers wrap structured payloads in
//! [`JsonPayload`] or [`BytePayload`], ask [`need_keep_secrecy`] before
//! emitting them and decide what to do with a positive answer.
//!
//! [`need_keep_secrecy`]: JsonPayload::need_keep_secrecy

use crate::core::{Field, FieldValue, Result};
use serde::Serialize;

/// Substrings that mark a payload as carrying a credential
pub const SECRECY_MARKERS: [&str; 3] = ["password", "passWord", "pass_word"];

/// Whether `msg` mentions a credential marker (case-sensitive)
///
/// # Example
///
/// ```
/// use logkit::secrecy::is_secrecy_msg;
///
/// assert!(is_secrecy_msg(r#"{"passWord":"x"}"#));
/// assert!(!is_secrecy_msg("PASSWORD"));
/// ```
pub fn is_secrecy_msg(msg: &str) -> bool {
    SECRECY_MARKERS.iter().any(|marker| msg.contains(marker))
}

/// Field emitted in place of a payload that could not be rendered
fn error_field(key: &str, error: impl std::fmt::Display) -> Field {
    Field::new(format!("{}Error", key), error.to_string())
}

/// Any serializable value logged as a JSON field under `key`
///
/// # Example
///
/// ```
/// use logkit::secrecy::JsonPayload;
/// use serde_json::json;
///
/// let login = JsonPayload::new("request", json!({"user": "ada", "password": "hunter2"}));
/// assert!(login.need_keep_secrecy());
///
/// let query = JsonPayload::new("request", json!({"page": 2}));
/// assert!(!query.need_keep_secrecy());
/// ```
#[derive(Debug, Clone)]
pub struct JsonPayload<T> {
    key: String,
    data: T,
}

impl<T: Serialize> JsonPayload<T> {
    pub fn new(key: impl Into<String>, data: T) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.data)?)
    }

    /// True when the serialized payload contains a credential marker
    ///
    /// A payload that cannot be serialized reports false.
    pub fn need_keep_secrecy(&self) -> bool {
        self.to_json()
            .map(|json| is_secrecy_msg(&json))
            .unwrap_or(false)
    }

    /// The payload as a JSON-valued field, or `<key>Error` when it does not serialize
    pub fn into_field(self) -> Field {
        match serde_json::to_value(&self.data) {
            Ok(value) => Field::new(self.key, FieldValue::Json(value)),
            Err(e) => error_field(&self.key, e),
        }
    }
}

/// Pre-serialized JSON bytes logged under `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePayload {
    key: String,
    data: Vec<u8>,
}

impl BytePayload {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn need_keep_secrecy(&self) -> bool {
        is_secrecy_msg(&String::from_utf8_lossy(&self.data))
    }

    /// The bytes as a JSON-valued field, or `<key>Error` when they are not valid JSON
    pub fn into_field(self) -> Field {
        match serde_json::from_slice::<serde_json::Value>(&self.data) {
            Ok(value) => Field::new(self.key, FieldValue::Json(value)),
            Err(e) => error_field(&self.key, e),
        }
    }
}

impl<T: Serialize> From<JsonPayload<T>> for Field {
    fn from(payload: JsonPayload<T>) -> Self {
        payload.into_field()
    }
}

impl From<BytePayload> for Field {
    fn from(payload: BytePayload) -> Self {
        payload.into_field()
    }
}
