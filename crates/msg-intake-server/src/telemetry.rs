// msg-intake-server/src/telemetry.rs
// ============================================================================
// Module: Intake Telemetry
// Description: Request counters and latency histogram with text exposition.
// Purpose: Provide thread-safe process metrics rendered in Prometheus format.
// Dependencies: msg-intake-core
// ============================================================================

//! ## Overview
//! The metrics registry accumulates HTTP request counters keyed by
//! `(path, status)`, webhook outcome counters, and a fixed-bucket latency
//! histogram with cumulative semantics: each bucket counts observations less
//! than or equal to its boundary, so the `+Inf` bucket always equals the
//! total observation count. A single mutex serializes every update and the
//! render operation; critical sections are O(bucket-count) and never touch
//! I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency histogram bucket boundaries in milliseconds, ascending.
pub const LATENCY_BUCKETS_MS: [u64; 10] = [10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000];

/// Number of histogram slots including the `+Inf` bucket.
const BUCKET_SLOTS: usize = LATENCY_BUCKETS_MS.len() + 1;

// ============================================================================
// SECTION: Outcome Labels
// ============================================================================

/// Webhook ingestion outcome classification.
///
/// # Invariants
/// - Variants are stable for metric labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// New message stored.
    Created,
    /// Replayed message; the stored row was untouched.
    Duplicate,
    /// Signature missing or mismatched.
    InvalidSignature,
    /// Malformed body or schema violation.
    ValidationError,
    /// Missing configuration or storage fault.
    ServerError,
}

impl WebhookOutcome {
    /// Returns the stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::InvalidSignature => "invalid_signature",
            Self::ValidationError => "validation_error",
            Self::ServerError => "server_error",
        }
    }
}

// ============================================================================
// SECTION: Metrics State
// ============================================================================

/// Mutable metrics state guarded by the registry mutex.
#[derive(Debug, Default)]
struct MetricsState {
    /// HTTP request counters keyed by `(path, status)`.
    http_requests: BTreeMap<(String, u16), u64>,
    /// Webhook outcome counters keyed by stable label.
    webhook_requests: BTreeMap<&'static str, u64>,
    /// Cumulative bucket counts; the final slot is the `+Inf` bucket.
    latency_buckets: [u64; BUCKET_SLOTS],
    /// Total latency observations.
    latency_count: u64,
    /// Running latency sum in milliseconds.
    latency_sum_ms: f64,
}

/// Thread-safe metrics registry for the intake service.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Metrics state behind the single serialization point.
    state: Mutex<MetricsState>,
}

impl MetricsRegistry {
    /// Creates an empty metrics registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the HTTP request counter for `(path, status)`.
    pub fn record_http_request(&self, path: &str, status: u16) {
        if let Ok(mut state) = self.state.lock() {
            *state.http_requests.entry((path.to_string(), status)).or_insert(0) += 1;
        }
    }

    /// Increments the webhook outcome counter.
    pub fn record_webhook_outcome(&self, outcome: WebhookOutcome) {
        if let Ok(mut state) = self.state.lock() {
            *state.webhook_requests.entry(outcome.as_str()).or_insert(0) += 1;
        }
    }

    /// Records one latency observation in milliseconds.
    ///
    /// Negative observations are clamped to zero. Every bucket whose boundary
    /// is greater than or equal to the observation is incremented, along with
    /// the `+Inf` bucket, the total count, and the running sum.
    pub fn observe_latency_ms(&self, latency_ms: f64) {
        let clamped = if latency_ms.is_finite() && latency_ms > 0.0 { latency_ms } else { 0.0 };
        if let Ok(mut state) = self.state.lock() {
            state.latency_count += 1;
            state.latency_sum_ms += clamped;
            for (slot, boundary) in LATENCY_BUCKETS_MS.iter().enumerate() {
                if clamped <= boundary_ms(*boundary) {
                    state.latency_buckets[slot] += 1;
                }
            }
            state.latency_buckets[BUCKET_SLOTS - 1] += 1;
        }
    }

    /// Renders all metrics in Prometheus text exposition format.
    ///
    /// Output is deterministic: counters sort by key and histogram lines are
    /// emitted in ascending boundary order ending with `+Inf`.
    #[must_use]
    pub fn render(&self) -> String {
        let Ok(state) = self.state.lock() else {
            return String::new();
        };
        let mut lines = Vec::new();

        lines.push("# HELP http_requests_total Total HTTP requests".to_string());
        lines.push("# TYPE http_requests_total counter".to_string());
        for ((path, status), count) in &state.http_requests {
            lines.push(format!("http_requests_total{{path=\"{path}\",status=\"{status}\"}} {count}"));
        }

        lines.push(String::new());
        lines.push("# HELP webhook_requests_total Total webhook requests by result".to_string());
        lines.push("# TYPE webhook_requests_total counter".to_string());
        for (result, count) in &state.webhook_requests {
            lines.push(format!("webhook_requests_total{{result=\"{result}\"}} {count}"));
        }

        lines.push(String::new());
        lines.push("# HELP request_latency_ms Request latency in milliseconds".to_string());
        lines.push("# TYPE request_latency_ms histogram".to_string());
        for (slot, boundary) in LATENCY_BUCKETS_MS.iter().enumerate() {
            lines.push(format!(
                "request_latency_ms_bucket{{le=\"{boundary}\"}} {}",
                state.latency_buckets[slot]
            ));
        }
        lines.push(format!(
            "request_latency_ms_bucket{{le=\"+Inf\"}} {}",
            state.latency_buckets[BUCKET_SLOTS - 1]
        ));
        lines.push(format!("request_latency_ms_count {}", state.latency_count));
        let mut sum_line = String::new();
        let _ = write!(sum_line, "request_latency_ms_sum {:.2}", state.latency_sum_ms);
        lines.push(sum_line);

        lines.join("\n")
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a bucket boundary to milliseconds as `f64`.
///
/// Boundaries are small integers, so the conversion is exact.
#[allow(clippy::cast_precision_loss, reason = "Boundaries fit exactly in f64.")]
const fn boundary_ms(boundary: u64) -> f64 {
    boundary as f64
}
