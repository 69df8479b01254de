// msg-intake-server/src/logging.rs
// ============================================================================
// Module: Structured Request Logging
// Description: JSON-line request log events and pluggable log sinks.
// Purpose: Emit level-filtered structured logs without ambient context.
// Dependencies: msg-intake-config, msg-intake-core, rand, serde, serde_json
// ============================================================================

//! ## Overview
//! Request log events are explicit values threaded through the call chain;
//! there is no thread-local or ambient logging context. Each event serializes
//! to a single JSON line carrying the request identifier, method, path,
//! status, and latency, plus webhook-specific fields where relevant. Sinks
//! are pluggable so tests can capture or discard output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use msg_intake_config::LogLevel;
use msg_intake_core::timefmt;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Counter mixing constant for request identifier generation.
const ID_MIX: u64 = 0x9e37_79b9_7f4a_7c15;
/// Mask keeping request identifiers at eight hex characters.
const ID_MASK: u64 = 0xffff_ffff;

// ============================================================================
// SECTION: Request Identifiers
// ============================================================================

/// Generates short per-request identifiers.
///
/// # Invariants
/// - Identifiers are unique within a process boot (seed XOR mixed counter).
#[derive(Debug)]
pub struct RequestIdGenerator {
    /// Boot-scoped random seed.
    seed: u64,
    /// Monotonic issue counter.
    counter: AtomicU64,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdGenerator {
    /// Creates a generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            seed: OsRng.next_u64(),
            counter: AtomicU64::new(0),
        }
    }

    /// Issues the next eight-hex-character request identifier.
    #[must_use]
    pub fn issue(&self) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let value = (self.seed ^ count.wrapping_mul(ID_MIX)) & ID_MASK;
        format!("{value:08x}")
    }
}

// ============================================================================
// SECTION: Log Events
// ============================================================================

/// One structured log event serialized as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEvent {
    /// Event time in `YYYY-MM-DDTHH:MM:SSZ` form.
    pub ts: String,
    /// Uppercase level label.
    pub level: &'static str,
    /// Event message.
    pub message: String,
    /// Request identifier when the event is request-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// HTTP method when the event is request-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request path when the event is request-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Response status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Request latency in milliseconds, rounded to two decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Message identifier for webhook events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Duplicate flag for webhook events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dup: Option<bool>,
    /// Webhook outcome label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'static str>,
    /// Severity used for sink threshold filtering.
    #[serde(skip)]
    pub severity: LogLevel,
}

impl RequestLogEvent {
    /// Builds a completed-request event.
    #[must_use]
    pub fn request_completed(
        request_id: &str,
        method: &str,
        path: &str,
        status: u16,
        latency_ms: f64,
    ) -> Self {
        Self {
            ts: timefmt::now_utc_string(),
            level: LogLevel::Info.as_str(),
            message: "request completed".to_string(),
            request_id: Some(request_id.to_string()),
            method: Some(method.to_string()),
            path: Some(path.to_string()),
            status: Some(status),
            latency_ms: Some(round_latency(latency_ms)),
            message_id: None,
            dup: None,
            result: None,
            severity: LogLevel::Info,
        }
    }

    /// Builds a webhook terminal event with ingestion-specific fields.
    #[must_use]
    pub fn webhook_completed(
        request_id: &str,
        status: u16,
        latency_ms: f64,
        message_id: Option<&str>,
        dup: bool,
        result: &'static str,
    ) -> Self {
        Self {
            ts: timefmt::now_utc_string(),
            level: LogLevel::Info.as_str(),
            message: "request completed".to_string(),
            request_id: Some(request_id.to_string()),
            method: Some("POST".to_string()),
            path: Some("/webhook".to_string()),
            status: Some(status),
            latency_ms: Some(round_latency(latency_ms)),
            message_id: message_id.map(str::to_string),
            dup: Some(dup),
            result: Some(result),
            severity: LogLevel::Info,
        }
    }

    /// Builds an error event tied to a request.
    #[must_use]
    pub fn error(request_id: &str, message: impl Into<String>) -> Self {
        Self {
            ts: timefmt::now_utc_string(),
            level: LogLevel::Error.as_str(),
            message: message.into(),
            request_id: Some(request_id.to_string()),
            method: None,
            path: None,
            status: None,
            latency_ms: None,
            message_id: None,
            dup: None,
            result: None,
            severity: LogLevel::Error,
        }
    }

    /// Builds a process-level warning event.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            ts: timefmt::now_utc_string(),
            level: LogLevel::Warning.as_str(),
            message: message.into(),
            request_id: None,
            method: None,
            path: None,
            status: None,
            latency_ms: None,
            message_id: None,
            dup: None,
            result: None,
            severity: LogLevel::Warning,
        }
    }
}

/// Rounds latency to two decimal places for log output.
fn round_latency(latency_ms: f64) -> f64 {
    (latency_ms * 100.0).round() / 100.0
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for structured log events.
pub trait LogSink: Send + Sync {
    /// Records one log event.
    fn record(&self, event: &RequestLogEvent);
}

/// Sink writing JSON lines to stderr, filtered by level threshold.
pub struct StderrLogSink {
    /// Minimum severity emitted.
    min_level: LogLevel,
}

impl StderrLogSink {
    /// Creates a sink with the given level threshold.
    #[must_use]
    pub const fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
        }
    }
}

impl LogSink for StderrLogSink {
    #[allow(clippy::print_stderr, reason = "Structured log lines are emitted to stderr.")]
    fn record(&self, event: &RequestLogEvent) {
        if event.severity < self.min_level {
            return;
        }
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
    }
}

/// No-op sink for tests.
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn record(&self, _event: &RequestLogEvent) {}
}
