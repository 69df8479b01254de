// msg-intake-server/src/lib.rs
// ============================================================================
// Module: Msg Intake Server Library
// Description: HTTP ingestion surface for the Msg Intake service.
// Purpose: Expose the webhook, retrieval, health, and metrics endpoints.
// Dependencies: crate::{auth, logging, server, telemetry}
// ============================================================================

//! ## Overview
//! The server crate composes signature verification, payload validation, the
//! message store, and the metrics registry into the HTTP surface: a signed
//! `POST /webhook` ingestion endpoint, read-side retrieval and statistics
//! endpoints, liveness/readiness probes, and Prometheus text exposition. All
//! collaborators are explicit values constructed once at startup and passed
//! by handle into every request path.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod logging;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::SignatureVerifier;
pub use logging::LogSink;
pub use logging::NoopLogSink;
pub use logging::RequestIdGenerator;
pub use logging::RequestLogEvent;
pub use logging::StderrLogSink;
pub use server::IntakeServer;
pub use server::IntakeServerError;
pub use server::ServerState;
pub use server::build_router;
pub use telemetry::LATENCY_BUCKETS_MS;
pub use telemetry::MetricsRegistry;
pub use telemetry::WebhookOutcome;
