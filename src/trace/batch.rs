//! Batching span processor driven by a dedicated thread
//!
//! Finished spans are queued on a bounded channel and handed to the exporter
//! in batches, either when a batch fills up or once per export interval. The
//! exporter's futures are driven with `futures_executor::block_on`, so no
//! async runtime is required.

use crate::core::metrics::diagnostics;
use crate::core::{LoggerError, Result};
use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use opentelemetry::trace::{TraceError, TraceResult};
use opentelemetry::Context;
use opentelemetry_sdk::export::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::trace::{Span, SpanProcessor};
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;
use std::fmt;
use std::thread::JoinHandle;
use std::time::Duration;

/// Queue and batch limits for [`BatchExportProcessor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Finished spans waiting for export; further spans are dropped
    pub max_queue_size: usize,
    /// Spans handed to the exporter per call
    pub max_export_batch_size: usize,
    /// Period of the scheduled export
    pub export_interval: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            export_interval: Duration::from_secs(5),
        }
    }
}

enum Message {
    Span(SpanData),
    Resource(Resource),
    Flush(Sender<TraceResult<()>>),
    Shutdown(Sender<TraceResult<()>>),
}

/// Span processor exporting sampled spans in batches from a worker thread
pub struct BatchExportProcessor {
    sender: Sender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
    settings: BatchSettings,
}

impl BatchExportProcessor {
    pub fn new<E: SpanExporter + 'static>(exporter: E, settings: BatchSettings) -> Result<Self> {
        if settings.max_queue_size == 0 || settings.max_export_batch_size == 0 {
            return Err(LoggerError::config("span export", "queue and batch sizes must be positive"));
        }
        if settings.export_interval.is_zero() {
            return Err(LoggerError::config("span export", "export interval must be positive"));
        }

        let (sender, receiver) = crossbeam_channel::bounded(settings.max_queue_size);
        let exporter: Box<dyn SpanExporter> = Box::new(exporter);
        let handle = std::thread::Builder::new()
            .name("span-export".to_string())
            .spawn(move || run(exporter, receiver, settings))
            .map_err(|e| {
                LoggerError::io_operation("spawn span export thread", "Failed to start thread", e)
            })?;

        Ok(Self {
            sender,
            worker: Mutex::new(Some(handle)),
            settings,
        })
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    fn request(&self, make: fn(Sender<TraceResult<()>>) -> Message) -> TraceResult<()> {
        let (reply, replied) = crossbeam_channel::bounded(1);
        self.sender
            .send(make(reply))
            .map_err(|_| TraceError::from("span export worker stopped"))?;
        replied
            .recv()
            .map_err(|_| TraceError::from("span export worker stopped"))?
    }
}

fn run(mut exporter: Box<dyn SpanExporter>, receiver: Receiver<Message>, settings: BatchSettings) {
    let ticker = crossbeam_channel::tick(settings.export_interval);
    let mut batch = Vec::with_capacity(settings.max_export_batch_size);

    loop {
        select! {
            recv(receiver) -> message => match message {
                Ok(Message::Span(span)) => {
                    batch.push(span);
                    if batch.len() >= settings.max_export_batch_size {
                        let _ = export(exporter.as_mut(), &mut batch);
                    }
                }
                Ok(Message::Resource(resource)) => exporter.set_resource(&resource),
                Ok(Message::Flush(reply)) => {
                    let _ = reply.send(export(exporter.as_mut(), &mut batch));
                }
                Ok(Message::Shutdown(reply)) => {
                    let exported = export(exporter.as_mut(), &mut batch);
                    exporter.shutdown();
                    let _ = reply.send(exported);
                    break;
                }
                Err(_) => {
                    let _ = export(exporter.as_mut(), &mut batch);
                    exporter.shutdown();
                    break;
                }
            },
            recv(ticker) -> _ => {
                let _ = export(exporter.as_mut(), &mut batch);
            }
        }
    }
}

/// Hand the pending batch to the exporter, counting a rejected batch
fn export(exporter: &mut dyn SpanExporter, batch: &mut Vec<SpanData>) -> TraceResult<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let spans = std::mem::take(batch);
    let count = spans.len();
    futures_executor::block_on(exporter.export(spans)).map_err(|e| {
        diagnostics().report_export_failure(count, &e);
        e
    })
}

impl SpanProcessor for BatchExportProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }
        match self.sender.try_send(Message::Span(span)) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                diagnostics().record_dropped_span();
            }
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        if self.worker.lock().is_none() {
            return Ok(());
        }
        self.request(Message::Flush)
    }

    /// Export what is queued, shut the exporter down and stop the worker
    fn shutdown(&self) -> TraceResult<()> {
        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };
        let result = self.request(Message::Shutdown);
        if handle.join().is_err() {
            return Err(TraceError::from("span export thread panicked"));
        }
        result
    }

    fn set_resource(&mut self, resource: &Resource) {
        let _ = self.sender.send(Message::Resource(resource.clone()));
    }
}

impl Drop for BatchExportProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            eprintln!("[LOGGER WARNING] span export shutdown failed: {}", e);
        }
    }
}

impl fmt::Debug for BatchExportProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExportProcessor")
            .field("settings", &self.settings)
            .field("running", &self.worker.lock().is_some())
            .finish()
    }
}
