//! Request-scoped fields
//!
//! A request travels as an [`opentelemetry::Context`]. Besides the active span
//! it may carry [`IncomingMetadata`] (inbound headers) and a [`NoticeTags`]
//! bag that handlers fill with [`append_notice`]. [`ext_fields`] turns a
//! context into the fields every context logger attaches.

use crate::core::{diagnostics, Field, FieldValue, LogContext, NoticeTags};
use crate::trace::{span_id_from_context, trace_id_from_context};
use opentelemetry::Context;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

pub const TRACE_ID_KEY: &str = "traceId";
pub const SPAN_ID_KEY: &str = "spanId";
pub const BAGGAGE_FLOW_KEY: &str = "baggageFlow";
pub const GID_KEY: &str = "gid";

/// Inbound request metadata with case-insensitive keys
///
/// # Example
///
/// ```
/// use logkit::context::IncomingMetadata;
///
/// let meta = IncomingMetadata::from_pairs([("BaggageFlow", "canary")]);
/// assert_eq!(meta.get("baggageflow"), Some("canary"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMetadata {
    entries: HashMap<String, Vec<String>>,
}

impl IncomingMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut meta = Self::new();
        for (key, value) in pairs {
            meta.insert(key.as_ref(), value);
        }
        meta
    }

    /// Collect the UTF-8 values of an HTTP header map
    pub fn from_headers(headers: &http::HeaderMap) -> Self {
        let mut meta = Self::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                meta.insert(name.as_str(), value);
            }
        }
        meta
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Attach inbound metadata to a context
pub fn with_incoming_metadata(cx: &Context, metadata: IncomingMetadata) -> Context {
    cx.with_value(metadata)
}

pub fn incoming_metadata(cx: &Context) -> Option<&IncomingMetadata> {
    cx.get::<IncomingMetadata>()
}

/// Attach a fresh notice bag to a context
///
/// The bag is shared: notices appended through any clone of the returned
/// context are visible to all of them.
pub fn with_notice_tags(cx: &Context) -> Context {
    cx.with_value(NoticeTags::new())
}

pub fn notice_tags(cx: &Context) -> Option<&NoticeTags> {
    cx.get::<NoticeTags>()
}

/// Record key/value notices on the context's tag bag
///
/// `args` alternates keys and values. The call is ignored as a whole when the
/// context has no bag, the argument count is odd, or a key is not a string.
///
/// # Example
///
/// ```
/// use logkit::context::{append_notice, notice_fields, with_notice_tags};
/// use logkit::core::FieldValue;
/// use opentelemetry::Context;
///
/// let cx = with_notice_tags(&Context::new());
/// append_notice(&cx, &[FieldValue::from("user"), FieldValue::from(42_i64)]);
///
/// assert_eq!(notice_fields(&cx).get("user"), Some(&FieldValue::Int(42)));
/// ```
pub fn append_notice(cx: &Context, args: &[FieldValue]) {
    if args.is_empty() {
        return;
    }
    if args.len() % 2 != 0 {
        diagnostics().report_malformed_notice("odd number of arguments");
        return;
    }
    let Some(tags) = notice_tags(cx) else {
        return;
    };

    let mut pairs = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks_exact(2) {
        match &pair[0] {
            FieldValue::String(key) => pairs.push((key.clone(), pair[1].clone())),
            other => {
                diagnostics().report_malformed_notice(&format!("non-string key {}", other));
                return;
            }
        }
    }
    for (key, value) in pairs {
        tags.set(key, value);
    }
}

/// Snapshot of the notices recorded on `cx`, empty when it has no bag
pub fn notice_fields(cx: &Context) -> LogContext {
    notice_tags(cx)
        .map(NoticeTags::to_log_context)
        .unwrap_or_default()
}

/// Fields identifying the request and the task handling it
///
/// Always four entries in order: `traceId`, `spanId`, `baggageFlow`, `gid`.
/// The first three are [`Field::Skip`] when the context has no value for them.
pub fn ext_fields(cx: &Context) -> Vec<Field> {
    vec![
        trace_id_field(cx),
        span_id_field(cx),
        baggage_flow_field(cx),
        Field::new(GID_KEY, task_id()),
    ]
}

pub fn trace_id_field(cx: &Context) -> Field {
    non_empty_field(TRACE_ID_KEY, trace_id_from_context(cx))
}

pub fn span_id_field(cx: &Context) -> Field {
    non_empty_field(SPAN_ID_KEY, span_id_from_context(cx))
}

pub fn baggage_flow_field(cx: &Context) -> Field {
    let flow = incoming_metadata(cx)
        .and_then(|meta| meta.get(BAGGAGE_FLOW_KEY))
        .unwrap_or_default();
    non_empty_field(BAGGAGE_FLOW_KEY, flow.to_string())
}

fn non_empty_field(key: &str, value: String) -> Field {
    if value.is_empty() {
        Field::skip()
    } else {
        Field::new(key, value)
    }
}

static NEXT_THREAD_ID: AtomicI64 = AtomicI64::new(1);

thread_local! {
    static THREAD_ID: i64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Identifier of the task or thread executing the caller
///
/// Inside a Tokio task this is the task id; elsewhere a per-thread id
/// assigned on first use. An id that cannot be read as an integer yields 0.
pub fn task_id() -> i64 {
    #[cfg(feature = "tokio")]
    {
        if let Some(id) = tokio::task::try_id() {
            return parse_task_id(&id.to_string());
        }
    }

    THREAD_ID.with(|id| *id)
}

fn parse_task_id(raw: &str) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(id) => id,
        Err(_) => {
            diagnostics().record_task_id_fallback();
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };

    fn traced_context() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_ext_fields_on_empty_context() {
        let fields = ext_fields(&Context::new());
        assert_eq!(fields.len(), 4);
        assert!(fields[0].is_skip());
        assert!(fields[1].is_skip());
        assert!(fields[2].is_skip());
        assert_eq!(fields[3].key(), Some(GID_KEY));
    }

    #[test]
    fn test_ext_fields_with_span_and_baggage() {
        let meta = IncomingMetadata::from_pairs([("baggageFlow", "blue")]);
        let cx = with_incoming_metadata(&traced_context(), meta);

        let fields = ext_fields(&cx);
        assert_eq!(
            fields[0].value(),
            Some(&FieldValue::from("4bf92f3577b34da6a3ce929d0e0e4736"))
        );
        assert_eq!(fields[1].value(), Some(&FieldValue::from("00f067aa0ba902b7")));
        assert_eq!(fields[2].value(), Some(&FieldValue::from("blue")));
    }

    #[test]
    fn test_empty_baggage_flow_is_skipped() {
        let meta = IncomingMetadata::from_pairs([("baggageflow", "")]);
        let cx = with_incoming_metadata(&Context::new(), meta);
        assert!(baggage_flow_field(&cx).is_skip());
    }

    #[test]
    fn test_metadata_from_headers() {
        let mut headers = http::HeaderMap::new();
        headers.insert("BaggageFlow", http::HeaderValue::from_static("green"));
        headers.append("x-tag", http::HeaderValue::from_static("a"));
        headers.append("x-tag", http::HeaderValue::from_static("b"));

        let meta = IncomingMetadata::from_headers(&headers);
        assert_eq!(meta.get("BAGGAGEFLOW"), Some("green"));
        assert_eq!(meta.get_all("x-tag"), ["a".to_string(), "b".to_string()]);
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn test_append_notice_sets_pairs() {
        let cx = with_notice_tags(&Context::new());
        append_notice(
            &cx,
            &[
                FieldValue::from("order"),
                FieldValue::from("A-17"),
                FieldValue::from("amount"),
                FieldValue::from(12.5),
            ],
        );

        let fields = notice_fields(&cx);
        assert_eq!(fields.get("order"), Some(&FieldValue::from("A-17")));
        assert_eq!(fields.get("amount"), Some(&FieldValue::Float(12.5)));
    }

    #[test]
    fn test_append_notice_odd_arguments_is_noop() {
        let cx = with_notice_tags(&Context::new());
        let before = diagnostics().malformed_notices();
        append_notice(&cx, &[FieldValue::from("a"), FieldValue::from(1), FieldValue::from("b")]);

        assert!(notice_tags(&cx).unwrap().is_empty());
        assert!(diagnostics().malformed_notices() > before);
    }

    #[test]
    fn test_append_notice_non_string_key_applies_nothing() {
        let cx = with_notice_tags(&Context::new());
        append_notice(
            &cx,
            &[
                FieldValue::from("first"),
                FieldValue::from(1),
                FieldValue::from(2),
                FieldValue::from("second"),
            ],
        );
        assert!(notice_tags(&cx).unwrap().is_empty());
    }

    #[test]
    fn test_append_notice_without_bag_is_noop() {
        let cx = Context::new();
        append_notice(&cx, &[FieldValue::from("k"), FieldValue::from("v")]);
        assert!(notice_fields(&cx).is_empty());
    }

    #[test]
    fn test_notice_bag_shared_between_clones() {
        let cx = with_notice_tags(&Context::new());
        let handler_cx = cx.clone();
        append_notice(&handler_cx, &[FieldValue::from("user"), FieldValue::from("ada")]);
        assert_eq!(notice_fields(&cx).len(), 1);
    }

    #[test]
    fn test_thread_ids_stable_and_distinct() {
        let here = THREAD_ID.with(|id| *id);
        assert_eq!(THREAD_ID.with(|id| *id), here);

        let there = std::thread::spawn(|| THREAD_ID.with(|id| *id)).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_unparseable_task_id_falls_back_to_zero() {
        let before = diagnostics().task_id_fallbacks();
        assert_eq!(parse_task_id("not-a-number"), 0);
        assert_eq!(parse_task_id("17"), 17);
        assert!(diagnostics().task_id_fallbacks() > before);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_task_ids_distinct_across_tasks() {
        let first = tokio::spawn(async { task_id() }).await.unwrap();
        let second = tokio::spawn(async { task_id() }).await.unwrap();
        assert_ne!(first, second);
        assert!(first > 0 && second > 0);
    }
}
