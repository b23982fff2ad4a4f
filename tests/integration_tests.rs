//! Integration tests for the routing pipeline
//!
//! These tests verify:
//! - Level-split file routing (base, error, warn)
//! - Stdout mirroring and encoder selection
//! - Request-context fields and notices
//! - Log injection prevention
//! - Thread safety

use logkit::config::{FileLogConfig, LogConfig};
use logkit::context::{
    append_notice, notice_fields, with_incoming_metadata, with_notice_tags, IncomingMetadata,
};
use logkit::core::{FieldValue, LogContext, Logger};
use logkit::router::{build_cores_with_console, new_logger_with_console};
use logkit::secrecy::JsonPayload;
use logkit::sinks::{ConsoleSink, SharedBuffer};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::Context;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn file_config(dir: &TempDir, format: &str) -> LogConfig {
    LogConfig::new("orders")
        .with_format(format)
        .with_stdout(true)
        .with_file(FileLogConfig::new(dir.path().join("app.log").to_string_lossy()))
}

fn json_lines(content: &str) -> Vec<Value> {
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a JSON record"))
        .collect()
}

fn read_records(path: &Path) -> Vec<Value> {
    json_lines(&fs::read_to_string(path).expect("log file exists"))
}

fn messages(records: &[Value]) -> Vec<&str> {
    records.iter().map(|r| r["msg"].as_str().unwrap()).collect()
}

fn traced_context() -> Context {
    Context::new().with_remote_span_context(SpanContext::new(
        TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
        SpanId::from_hex("00f067aa0ba902b7").unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    ))
}

#[test]
fn test_level_split_routing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let stdout = SharedBuffer::new();
    let logger = new_logger_with_console(
        &file_config(&temp_dir, "json"),
        ConsoleSink::from_writer(stdout.clone()),
    )
    .unwrap();

    logger.debug("below base level");
    logger.info("server started");
    logger.warn("slow upstream");
    logger.error("payment declined");
    logger.fatal("out of disk");
    logger.close().expect("Failed to close");

    let base = read_records(&temp_dir.path().join("app.log"));
    assert_eq!(
        messages(&base),
        vec!["server started", "slow upstream", "payment declined", "out of disk"]
    );
    assert!(base.iter().all(|r| r["app"] == "orders"));

    let errors = read_records(&temp_dir.path().join("error/error.log"));
    assert_eq!(messages(&errors), vec!["payment declined"]);

    let warnings = read_records(&temp_dir.path().join("error/warn.log"));
    assert_eq!(messages(&warnings), vec!["slow upstream"]);

    assert_eq!(messages(&json_lines(&stdout.contents())), messages(&base));
}

#[test]
fn test_stdout_only_builds_single_core() {
    let stdout = SharedBuffer::new();
    let cfg = LogConfig::new("orders").with_format("json").with_stdout(true);
    let cores = build_cores_with_console(&cfg, ConsoleSink::from_writer(stdout.clone())).unwrap();
    assert_eq!(cores.len(), 1);
    assert_eq!(cores[0].sink_names(), vec!["console"]);

    let logger = Logger::new(cores);
    logger.error("only on stdout");

    let records = json_lines(&stdout.contents());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "error");
    assert!(records[0].get("app").is_none());
}

#[test]
fn test_console_format_in_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = new_logger_with_console(
        &file_config(&temp_dir, "text"),
        ConsoleSink::from_writer(SharedBuffer::new()),
    )
    .unwrap();

    logger.warn("tab separated");
    logger.close().unwrap();

    let content = fs::read_to_string(temp_dir.path().join("error/warn.log")).unwrap();
    let columns: Vec<&str> = content.trim_end().split('\t').collect();
    assert_eq!(columns[1], "warn");
    assert_eq!(columns[2], "orders");
    assert_eq!(columns[3], "tab separated");
}

#[test]
fn test_context_logger_fields() {
    let stdout = SharedBuffer::new();
    let cfg = LogConfig::new("orders").with_format("json").with_stdout(true);
    let logger = new_logger_with_console(&cfg, ConsoleSink::from_writer(stdout.clone())).unwrap();

    let cx = with_incoming_metadata(
        &traced_context(),
        IncomingMetadata::from_pairs([("BaggageFlow", "canary")]),
    );
    logger.for_context(&cx).info("handled");
    logger.for_context(&Context::new()).info("no request");

    let records = json_lines(&stdout.contents());
    let traced = &records[0];
    assert_eq!(traced["traceId"], "4bf92f3577b34da6a3ce929d0e0e4736");
    assert_eq!(traced["spanId"], "00f067aa0ba902b7");
    assert_eq!(traced["baggageFlow"], "canary");
    assert!(traced["gid"].is_i64());
    assert!(traced["caller"].as_str().unwrap().contains("integration_tests.rs"));

    let keys: Vec<&String> = traced.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["level", "ts", "app", "caller", "msg", "traceId", "spanId", "baggageFlow", "gid"]
    );

    let bare = records[1].as_object().unwrap();
    assert!(!bare.contains_key("traceId"));
    assert!(!bare.contains_key("spanId"));
    assert!(!bare.contains_key("baggageFlow"));
    assert!(bare.contains_key("gid"));
}

#[test]
fn test_notices_and_payloads_as_fields() {
    let stdout = SharedBuffer::new();
    let cfg = LogConfig::new("orders").with_format("json").with_stdout(true);
    let logger = new_logger_with_console(&cfg, ConsoleSink::from_writer(stdout.clone())).unwrap();

    let cx = with_notice_tags(&Context::new());
    append_notice(&cx, &[FieldValue::from("user"), FieldValue::from("ada")]);
    append_notice(&cx, &[FieldValue::from("items"), FieldValue::from(3_i64)]);

    let payload = JsonPayload::new("request", json!({"sku": "A-1", "qty": 2}));
    assert!(!payload.need_keep_secrecy());

    let mut fields = notice_fields(&cx);
    fields.push(payload.into_field());
    logger.info_with_context("request finished", fields);

    let record = &json_lines(&stdout.contents())[0];
    assert_eq!(record["user"], "ada");
    assert_eq!(record["items"], 3);
    assert_eq!(record["request"], json!({"sku": "A-1", "qty": 2}));
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = new_logger_with_console(
        &file_config(&temp_dir, "json"),
        ConsoleSink::from_writer(SharedBuffer::new()),
    )
    .unwrap();

    let forged = "User login\n{\"level\":\"error\",\"msg\":\"forged\"}\nINFO Continuation";
    logger.info(forged);
    logger.close().unwrap();

    let records = read_records(&temp_dir.path().join("app.log"));
    assert_eq!(records.len(), 1, "Log should be a single line");
    assert_eq!(records[0]["msg"], forged);
}

#[test]
fn test_log_injection_prevention_console() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = new_logger_with_console(
        &file_config(&temp_dir, "text"),
        ConsoleSink::from_writer(SharedBuffer::new()),
    )
    .unwrap();

    logger.info("User login\n2025-01-08T10:30:45.123Z\terror\tforged");
    logger.close().unwrap();

    let content = fs::read_to_string(temp_dir.path().join("app.log")).unwrap();
    assert_eq!(content.lines().count(), 1, "Log should be a single line");
    let columns: Vec<&str> = content.trim_end().split('\t').collect();
    assert_eq!(columns.len(), 4);
    assert_eq!(columns[3], "User login\\n2025-01-08T10:30:45.123Z\\terror\\tforged");
}

#[test]
fn test_special_characters_stay_valid_json() {
    let stdout = SharedBuffer::new();
    let cfg = LogConfig::new("orders").with_format("json").with_stdout(true);
    let logger = new_logger_with_console(&cfg, ConsoleSink::from_writer(stdout.clone())).unwrap();

    logger.info_with_context(
        r#"quote " backslash \ unicode ✓"#,
        LogContext::new().with_field("path", r"C:\temp"),
    );

    let record = &json_lines(&stdout.contents())[0];
    assert_eq!(record["msg"], r#"quote " backslash \ unicode ✓"#);
    assert_eq!(record["path"], r"C:\temp");
}

#[test]
fn test_concurrent_logging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Arc::new(
        new_logger_with_console(
            &file_config(&temp_dir, "json").with_stdout(false),
            ConsoleSink::from_writer(SharedBuffer::new()),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..100 {
                    if i % 10 == 0 {
                        logger.error(format!("thread {} failure {}", t, i));
                    } else {
                        logger.info(format!("thread {} message {}", t, i));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    logger.close().unwrap();

    assert_eq!(read_records(&temp_dir.path().join("app.log")).len(), 800);
    assert_eq!(read_records(&temp_dir.path().join("error/error.log")).len(), 80);
    assert!(fs::read_to_string(temp_dir.path().join("error/warn.log")).unwrap().is_empty());
}
