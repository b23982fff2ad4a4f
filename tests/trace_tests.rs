//! Tracer bootstrap, span export and propagation round-trips
//!
//! The tracer provider is a process global, so these tests run one at a time.

use logkit::config::LogConfig;
use logkit::router::new_logger_with_console;
use logkit::sinks::{ConsoleSink, SharedBuffer};
use logkit::trace::{
    extract_http_headers, extract_text_map, inject_http_headers, inject_text_map, set_tracer,
    set_tracer_with_exporter, span_id_from_context, trace_id_from_context, TraceConfig,
};
use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use opentelemetry::{global, Context};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

#[derive(Debug, Clone, Default)]
struct CollectingExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    resource: Arc<Mutex<Option<Resource>>>,
}

impl SpanExporter for CollectingExporter {
    fn export(
        &mut self,
        batch: Vec<SpanData>,
    ) -> Pin<Box<dyn Future<Output = ExportResult> + Send + 'static>> {
        self.spans.lock().extend(batch);
        Box::pin(async { Ok(()) })
    }

    fn set_resource(&mut self, resource: &Resource) {
        *self.resource.lock() = Some(resource.clone());
    }
}

fn started_span_context() -> Context {
    let tracer = global::tracer("trace-tests");
    let span = tracer.start("checkout");
    Context::current_with_span(span)
}

#[test]
fn test_tracer_lifecycle_and_propagation() {
    let _serial = SERIAL.lock();
    let guard = set_tracer(&TraceConfig::new("trace-tests").with_tag("env", "test"));
    assert!(!guard.is_noop());

    let cx = started_span_context();
    let trace_id = trace_id_from_context(&cx);
    let span_id = span_id_from_context(&cx);
    assert_eq!(trace_id.len(), 32);
    assert_eq!(span_id.len(), 16);
    assert!(trace_id.chars().all(|c| c.is_ascii_hexdigit()));

    let mut headers = http::HeaderMap::new();
    inject_http_headers(&cx, &mut headers);
    let traceparent = headers.get("traceparent").unwrap().to_str().unwrap().to_string();
    assert!(traceparent.contains(&trace_id));

    let remote = extract_http_headers(&headers);
    assert_eq!(trace_id_from_context(&remote), trace_id);
    assert_eq!(span_id_from_context(&remote), span_id);

    let mut carrier = HashMap::new();
    inject_text_map(&cx, &mut carrier);
    assert!(carrier.contains_key("traceparent"));
    let remote = extract_text_map(&carrier);
    assert_eq!(trace_id_from_context(&remote), trace_id);

    let stdout = SharedBuffer::new();
    let logger = new_logger_with_console(
        &LogConfig::new("trace-tests").with_format("json").with_stdout(true),
        ConsoleSink::from_writer(stdout.clone()),
    )
    .unwrap();
    logger.for_context(&remote).info("downstream");
    let record: serde_json::Value = serde_json::from_str(stdout.contents().trim_end()).unwrap();
    assert_eq!(record["traceId"], trace_id.as_str());
    assert_eq!(record["spanId"], span_id.as_str());

    cx.span().end();
    assert!(guard.close().is_ok());
    assert!(guard.close().is_ok());
    assert!(guard.is_noop());
}

#[test]
fn test_finished_spans_reach_the_exporter() {
    let _serial = SERIAL.lock();
    let exporter = CollectingExporter::default();
    let guard = set_tracer_with_exporter(
        &TraceConfig::new("export-tests").with_tag("env", "test"),
        exporter.clone(),
    );
    assert!(!guard.is_noop());

    let tracer = global::tracer("export-tests");
    let mut span = tracer.start("charge-card");
    let trace_id = span.span_context().trace_id().to_string();
    span.end();
    assert!(guard.close().is_ok());

    let spans = exporter.spans.lock();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "charge-card");
    assert_eq!(spans[0].span_context.trace_id().to_string(), trace_id);

    let resource = exporter.resource.lock().clone().unwrap();
    let attribute = |key: &'static str| resource.get(key.into()).map(|v| v.to_string());
    assert_eq!(attribute("service.name"), Some("export-tests".to_string()));
    assert_eq!(attribute("env"), Some("test".to_string()));
}

#[test]
fn test_extract_without_headers_is_empty() {
    let remote = extract_http_headers(&http::HeaderMap::new());
    assert!(trace_id_from_context(&remote).is_empty());
}
