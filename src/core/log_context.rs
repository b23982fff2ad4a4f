//! Structured fields attached to log records
//!
//! This module provides:
//! - `FieldValue`: typed value of a structured field
//! - `Field`: a key/value pair or a skip marker
//! - `LogContext`: ordered per-record fields
//! - `NoticeTags`: shared per-request tag bag

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Value type for structured logging fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(serde_json::Value),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Json(v) => write!(f, "{}", v),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl FieldValue {
    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Null => serde_json::Value::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Json(v)
    }
}

/// A structured field, or a marker that contributes nothing to the record
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    KeyValue(String, FieldValue),
    Skip,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Field::KeyValue(key.into(), value.into())
    }

    pub fn skip() -> Self {
        Field::Skip
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Field::Skip)
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Field::KeyValue(key, _) => Some(key),
            Field::Skip => None,
        }
    }

    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            Field::KeyValue(_, value) => Some(value),
            Field::Skip => None,
        }
    }
}

/// Ordered key/value fields attached to a record
///
/// Insertion order is the order fields are encoded in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext {
    fields: Vec<(String, FieldValue)>,
}

impl LogContext {
    /// Create a new empty log context
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a field to the context
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Add a field to the context (mutable version)
    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.push((key.into(), value.into()));
    }

    /// Append a field; skip markers are dropped
    pub fn push(&mut self, field: Field) {
        if let Field::KeyValue(key, value) = field {
            self.fields.push((key, value));
        }
    }

    /// Append every field of `other` after the current ones
    pub fn append(&mut self, other: &LogContext) {
        self.fields.extend(other.fields.iter().cloned());
    }

    /// Get the most recently added value for `key`
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if context has any fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Format fields as key=value pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<Field> for LogContext {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut context = LogContext::new();
        for field in iter {
            context.push(field);
        }
        context
    }
}

impl Extend<Field> for LogContext {
    fn extend<I: IntoIterator<Item = Field>>(&mut self, iter: I) {
        for field in iter {
            self.push(field);
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

/// Per-request tag bag shared by everything handling the request
///
/// Lives inside the request context; clones share the same storage, so tags
/// set deep in a call chain are visible to whoever emits the request log.
///
/// # Example
///
/// ```
/// use logkit::core::NoticeTags;
///
/// let tags = NoticeTags::new();
/// tags.set("user", "alice");
/// tags.set("items", 3);
///
/// assert_eq!(tags.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NoticeTags {
    fields: Arc<RwLock<BTreeMap<String, FieldValue>>>,
}

impl NoticeTags {
    /// Create a new empty tag bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag, overwriting any previous value
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.write().insert(key.into(), value.into());
    }

    /// Get a clone of a single tag
    pub fn get(&self, key: &str) -> Option<FieldValue> {
        self.fields.read().get(key).cloned()
    }

    /// Remove a tag
    pub fn remove(&self, key: &str) {
        self.fields.write().remove(key);
    }

    /// Clear all tags
    pub fn clear(&self) {
        self.fields.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Snapshot the tags as record fields, ordered by key
    pub fn to_log_context(&self) -> LogContext {
        let fields = self.fields.read();
        LogContext {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}
