//! Tracer bootstrap and trace-context helpers
//!
//! Installs an OpenTelemetry SDK tracer provider and the W3C trace-context
//! propagator as process globals, and exposes the identifiers of the active
//! span to the logging side. Finished spans reach a caller-supplied
//! [`SpanExporter`] through a [`BatchExportProcessor`].

mod batch;

pub use batch::{BatchExportProcessor, BatchSettings};

use crate::core::{LoggerError, Result};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_sdk::export::trace::SpanExporter;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self as sdktrace, Sampler};
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Tracer settings
///
/// # Example
///
/// ```
/// use logkit::trace::TraceConfig;
///
/// let config = TraceConfig::new("orders")
///     .with_sampling_ratio(0.25)
///     .with_tag("env", "staging");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceConfig {
    pub service_name: String,
    /// Fraction of root traces sampled, in `[0, 1]`
    pub sampling_ratio: f64,
    /// Extra resource attributes
    pub tags: Vec<(String, String)>,
    /// Finished spans held for export before new ones are dropped
    pub export_queue_size: usize,
    /// Spans handed to the exporter per call
    pub export_batch_size: usize,
    /// Milliseconds between scheduled exports
    pub export_interval_ms: u64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        let batch = BatchSettings::default();
        Self {
            service_name: String::new(),
            sampling_ratio: 1.0,
            tags: Vec::new(),
            export_queue_size: batch.max_queue_size,
            export_batch_size: batch.max_export_batch_size,
            export_interval_ms: batch.export_interval.as_millis() as u64,
        }
    }
}

impl TraceConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_sampling_ratio(mut self, ratio: f64) -> Self {
        self.sampling_ratio = ratio;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(LoggerError::config("tracer", "service name must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.sampling_ratio) {
            return Err(LoggerError::config(
                "tracer",
                format!("sampling ratio {} is outside [0, 1]", self.sampling_ratio),
            ));
        }
        if self.export_queue_size == 0 || self.export_batch_size == 0 || self.export_interval_ms == 0 {
            return Err(LoggerError::config(
                "tracer",
                "export queue size, batch size and interval must be positive",
            ));
        }
        Ok(())
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            max_queue_size: self.export_queue_size,
            max_export_batch_size: self.export_batch_size,
            export_interval: Duration::from_millis(self.export_interval_ms),
        }
    }

    fn resource(&self) -> Resource {
        let mut attributes = vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("hostname", hostname()),
        ];
        attributes.extend(
            self.tags
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
        );
        Resource::new(attributes)
    }
}

/// Owns the installed tracer provider; closing shuts it down
pub struct TracerGuard {
    provider: Mutex<Option<sdktrace::TracerProvider>>,
}

impl TracerGuard {
    /// Guard that owns nothing; closing it always succeeds
    pub fn noop() -> Self {
        Self {
            provider: Mutex::new(None),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.provider.lock().is_none()
    }

    /// Shut the provider down; later calls do nothing
    pub fn close(&self) -> Result<()> {
        match self.provider.lock().take() {
            Some(provider) => provider
                .shutdown()
                .map_err(|e| LoggerError::tracer(format!("shutdown failed: {}", e))),
            None => Ok(()),
        }
    }
}

impl Drop for TracerGuard {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER WARNING] {}", e);
        }
    }
}

impl std::fmt::Debug for TracerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerGuard")
            .field("noop", &self.is_noop())
            .finish()
    }
}

fn build_provider(
    cfg: &TraceConfig,
    processor: Option<BatchExportProcessor>,
) -> sdktrace::TracerProvider {
    let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(cfg.sampling_ratio)));
    let mut builder = sdktrace::TracerProvider::builder()
        .with_sampler(sampler)
        .with_resource(cfg.resource());
    if let Some(processor) = processor {
        builder = builder.with_span_processor(processor);
    }
    builder.build()
}

/// Build and install the global tracer provider and propagator
///
/// Spans carry identifiers for propagation and logging but are not exported;
/// use [`new_tracer_with_exporter`] to ship them somewhere.
///
/// An invalid configuration is logged as a warning; nothing is installed, the
/// guard is a no-op and the returned tracer is whatever the global provider
/// currently hands out.
pub fn new_tracer(cfg: &TraceConfig) -> (BoxedTracer, TracerGuard) {
    install(cfg, |_| Ok(None))
}

/// Like [`new_tracer`], exporting sampled spans through `exporter` in batches
///
/// Closing the guard exports the spans still queued and shuts the exporter
/// down.
pub fn new_tracer_with_exporter<E: SpanExporter + 'static>(
    cfg: &TraceConfig,
    exporter: E,
) -> (BoxedTracer, TracerGuard) {
    install(cfg, move |cfg| {
        BatchExportProcessor::new(exporter, cfg.batch_settings()).map(Some)
    })
}

fn install(
    cfg: &TraceConfig,
    processor: impl FnOnce(&TraceConfig) -> Result<Option<BatchExportProcessor>>,
) -> (BoxedTracer, TracerGuard) {
    let processor = match cfg.validate().and_then(|()| processor(cfg)) {
        Ok(processor) => processor,
        Err(e) => {
            log::warn!("Failed to initialize tracer: {}", e);
            return (global::tracer(cfg.service_name.clone()), TracerGuard::noop());
        }
    };

    let provider = build_provider(cfg, processor);
    global::set_text_map_propagator(TraceContextPropagator::new());
    let _previous = global::set_tracer_provider(provider.clone());

    (
        global::tracer(cfg.service_name.clone()),
        TracerGuard {
            provider: Mutex::new(Some(provider)),
        },
    )
}

/// Install the tracer and keep only the guard
pub fn set_tracer(cfg: &TraceConfig) -> TracerGuard {
    new_tracer(cfg).1
}

/// Install the exporting tracer and keep only the guard
pub fn set_tracer_with_exporter<E: SpanExporter + 'static>(
    cfg: &TraceConfig,
    exporter: E,
) -> TracerGuard {
    new_tracer_with_exporter(cfg, exporter).1
}

/// 32-hex trace id of the active span, empty when there is none
pub fn trace_id_from_context(cx: &Context) -> String {
    let span = cx.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        span_context.trace_id().to_string()
    } else {
        String::new()
    }
}

/// 16-hex span id of the active span, empty when there is none
pub fn span_id_from_context(cx: &Context) -> String {
    let span = cx.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        span_context.span_id().to_string()
    } else {
        String::new()
    }
}

pub fn inject_http_headers(cx: &Context, headers: &mut http::HeaderMap) {
    inject(cx, &mut HeaderInjector(headers));
}

pub fn extract_http_headers(headers: &http::HeaderMap) -> Context {
    extract(&HeaderExtractor(headers))
}

pub fn inject_text_map(cx: &Context, carrier: &mut HashMap<String, String>) {
    inject(cx, carrier);
}

pub fn extract_text_map(carrier: &HashMap<String, String>) -> Context {
    extract(carrier)
}

fn inject(cx: &Context, injector: &mut dyn Injector) {
    global::get_text_map_propagator(|propagator| propagator.inject_context(cx, injector));
}

fn extract(extractor: &dyn Extractor) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(extractor))
}

/// Host name reported as a resource attribute, empty when unavailable
pub fn hostname() -> String {
    #[cfg(unix)]
    {
        let mut buf = [0u8; 256];
        // SAFETY: the buffer is valid for `buf.len()` bytes and gethostname
        // writes at most that many.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
        if rc != 0 {
            return String::new();
        }
        let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").unwrap_or_default()
    }
}
