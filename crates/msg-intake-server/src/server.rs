// msg-intake-server/src/server.rs
// ============================================================================
// Module: Intake HTTP Server
// Description: Axum routes for ingestion, retrieval, health, and metrics.
// Purpose: Compose verifier, validator, store, and metrics per request.
// Dependencies: axum, msg-intake-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The webhook handler is a fail-fast gate sequence: configured secret,
//! signature, JSON parse, schema validation, idempotent insert. Each terminal
//! records exactly one webhook outcome counter; the tracking middleware
//! records the HTTP counter and one latency observation for every request.
//! Read paths bypass the gates and query the store directly. All collaborators
//! live in [`ServerState`] and are passed by handle, never as globals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Extension;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Json;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use msg_intake_core::FieldError;
use msg_intake_core::InboundMessage;
use msg_intake_core::InsertOutcome;
use msg_intake_core::MessageQuery;
use msg_intake_core::MessageStore;
use msg_intake_core::SharedMessageStore;
use msg_intake_core::interfaces::MAX_PAGE_LIMIT;
use msg_intake_core::interfaces::MIN_PAGE_LIMIT;
use msg_intake_core::timefmt;
use msg_intake_core::validate_inbound;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::auth::SignatureVerifier;
use crate::logging::LogSink;
use crate::logging::RequestIdGenerator;
use crate::logging::RequestLogEvent;
use crate::telemetry::MetricsRegistry;
use crate::telemetry::WebhookOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the client-supplied webhook signature.
const SIGNATURE_HEADER: &str = "x-signature";
/// Header echoing the server-issued request identifier.
const REQUEST_ID_HEADER: &str = "x-request-id";
/// Default page size for `/messages` when none is supplied.
const DEFAULT_LIST_LIMIT: i64 = 50;

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state handed to every request handler.
pub struct ServerState {
    /// Webhook signature verifier.
    pub verifier: SignatureVerifier,
    /// Message store handle.
    pub store: SharedMessageStore,
    /// Process metrics registry.
    pub metrics: Arc<MetricsRegistry>,
    /// Structured log sink.
    pub log: Arc<dyn LogSink>,
    /// Request identifier generator.
    request_ids: RequestIdGenerator,
}

impl ServerState {
    /// Builds server state from its collaborators.
    #[must_use]
    pub fn new(
        verifier: SignatureVerifier,
        store: SharedMessageStore,
        metrics: Arc<MetricsRegistry>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            verifier,
            store,
            metrics,
            log,
            request_ids: RequestIdGenerator::new(),
        }
    }
}

/// Per-request context inserted by the tracking middleware.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Server-issued request identifier.
    pub request_id: String,
    /// Request start instant for latency measurement.
    pub started: Instant,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the intake router with all routes and the tracking middleware.
#[must_use]
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/messages", get(list_messages))
        .route("/stats", get(stats))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/metrics", get(metrics_text))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), track_request))
        .with_state(state)
}

// ============================================================================
// SECTION: Tracking Middleware
// ============================================================================

/// Issues the request id, records metrics, and logs non-webhook requests.
async fn track_request(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = state.request_ids.issue();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    request.extensions_mut().insert(RequestMeta {
        request_id: request_id.clone(),
        started,
    });

    let mut response = next.run(request).await;

    let latency_ms = elapsed_ms(started);
    let status = response.status().as_u16();
    state.metrics.record_http_request(&path, status);
    state.metrics.observe_latency_ms(latency_ms);
    // The webhook handler emits its own line with ingestion fields.
    if path != "/webhook" {
        state.log.record(&RequestLogEvent::request_completed(
            &request_id,
            &method,
            &path,
            status,
            latency_ms,
        ));
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Returns the elapsed time since `started` in milliseconds.
fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}

// ============================================================================
// SECTION: Ingestion Orchestrator
// ============================================================================

/// Handles `POST /webhook`: verify, parse, validate, persist, respond.
async fn webhook(
    State(state): State<Arc<ServerState>>,
    Extension(meta): Extension<RequestMeta>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.verifier.has_secret() {
        state.log.record(&RequestLogEvent::error(&meta.request_id, "WEBHOOK_SECRET not configured"));
        return webhook_terminal(
            &state,
            &meta,
            WebhookOutcome::ServerError,
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"detail": "server not ready"}),
            None,
            false,
        );
    }

    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    if !state.verifier.verify(&body, signature) {
        state.log.record(&RequestLogEvent::error(&meta.request_id, "invalid or missing signature"));
        return webhook_terminal(
            &state,
            &meta,
            WebhookOutcome::InvalidSignature,
            StatusCode::UNAUTHORIZED,
            json!({"detail": "invalid signature"}),
            None,
            false,
        );
    }

    let Ok(payload) = serde_json::from_slice::<InboundMessage>(&body) else {
        return webhook_terminal(
            &state,
            &meta,
            WebhookOutcome::ValidationError,
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"detail": "Invalid JSON"}),
            None,
            false,
        );
    };

    let message = match validate_inbound(&payload, timefmt::now_utc_string()) {
        Ok(message) => message,
        Err(errors) => {
            return webhook_terminal(
                &state,
                &meta,
                WebhookOutcome::ValidationError,
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({"detail": errors.errors()}),
                payload.message_id.as_deref(),
                false,
            );
        }
    };

    match state.store.insert(&message) {
        Ok(InsertOutcome::Inserted) => webhook_terminal(
            &state,
            &meta,
            WebhookOutcome::Created,
            StatusCode::OK,
            json!({"status": "ok"}),
            Some(message.message_id.as_str()),
            false,
        ),
        Ok(InsertOutcome::Duplicate) => webhook_terminal(
            &state,
            &meta,
            WebhookOutcome::Duplicate,
            StatusCode::OK,
            json!({"status": "ok"}),
            Some(message.message_id.as_str()),
            true,
        ),
        Err(err) => {
            state
                .log
                .record(&RequestLogEvent::error(&meta.request_id, format!("storage fault: {err}")));
            webhook_terminal(
                &state,
                &meta,
                WebhookOutcome::ServerError,
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"detail": "internal server error"}),
                Some(message.message_id.as_str()),
                false,
            )
        }
    }
}

/// Records the outcome metric, logs the webhook line, and builds the response.
fn webhook_terminal(
    state: &ServerState,
    meta: &RequestMeta,
    outcome: WebhookOutcome,
    status: StatusCode,
    body: serde_json::Value,
    message_id: Option<&str>,
    dup: bool,
) -> Response {
    state.metrics.record_webhook_outcome(outcome);
    state.log.record(&RequestLogEvent::webhook_completed(
        &meta.request_id,
        status.as_u16(),
        elapsed_ms(meta.started),
        message_id,
        dup,
        outcome.as_str(),
    ));
    (status, Json(body)).into_response()
}

// ============================================================================
// SECTION: Retrieval
// ============================================================================

/// Query parameters for `GET /messages`.
#[derive(Debug, Deserialize)]
struct ListParams {
    /// Page size, validated into `[1, 100]`.
    limit: Option<i64>,
    /// Rows to skip, validated non-negative.
    offset: Option<i64>,
    /// Exact-match sender filter.
    from: Option<String>,
    /// Inclusive lower timestamp bound.
    since: Option<String>,
    /// Substring filter on message text.
    q: Option<String>,
}

/// One message item in the `/messages` response.
#[derive(Debug, Serialize)]
struct MessageOut {
    /// Message identifier.
    message_id: String,
    /// Sender address.
    #[serde(rename = "from")]
    from_address: String,
    /// Recipient address.
    #[serde(rename = "to")]
    to_address: String,
    /// Client-supplied timestamp.
    ts: String,
    /// Optional message body.
    text: Option<String>,
}

/// Response envelope for `GET /messages`.
#[derive(Debug, Serialize)]
struct MessagesListResponse {
    /// Messages in `(ts ASC, message_id ASC)` order.
    data: Vec<MessageOut>,
    /// Total rows matching the filters.
    total: u64,
    /// Echoed page size.
    limit: i64,
    /// Echoed offset.
    offset: i64,
}

/// Handles `GET /messages` with pagination and filters.
async fn list_messages(
    State(state): State<Arc<ServerState>>,
    Extension(meta): Extension<RequestMeta>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let mut errors = Vec::new();
    if limit < i64::from(MIN_PAGE_LIMIT) || limit > i64::from(MAX_PAGE_LIMIT) {
        errors.push(query_param_error(
            "limit",
            format!("limit must be between {MIN_PAGE_LIMIT} and {MAX_PAGE_LIMIT}"),
        ));
    }
    if offset < 0 {
        errors.push(query_param_error("offset", "offset must be non-negative".to_string()));
    }
    if !errors.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": errors})))
            .into_response();
    }

    let query = MessageQuery {
        limit: u32::try_from(limit).unwrap_or(MAX_PAGE_LIMIT),
        offset: u64::try_from(offset).unwrap_or(0),
        from_address: params.from,
        since: params.since,
        text_contains: params.q,
    };
    match state.store.query(&query) {
        Ok(page) => {
            let data = page
                .messages
                .into_iter()
                .map(|message| MessageOut {
                    message_id: message.message_id.as_str().to_string(),
                    from_address: message.from_address,
                    to_address: message.to_address,
                    ts: message.timestamp,
                    text: message.text,
                })
                .collect();
            Json(MessagesListResponse {
                data,
                total: page.total,
                limit,
                offset,
            })
            .into_response()
        }
        Err(err) => storage_failure(&state, &meta, &err),
    }
}

/// Builds a structured query-parameter validation error.
fn query_param_error(field: &str, msg: String) -> FieldError {
    FieldError {
        loc: vec!["query".to_string(), field.to_string()],
        msg,
        kind: "value_error".to_string(),
    }
}

// ============================================================================
// SECTION: Statistics & Health
// ============================================================================

/// Handles `GET /stats`.
async fn stats(
    State(state): State<Arc<ServerState>>,
    Extension(meta): Extension<RequestMeta>,
) -> Response {
    match state.store.stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => storage_failure(&state, &meta, &err),
    }
}

/// Handles `GET /health/live`; always healthy while the process runs.
async fn health_live() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

/// Handles `GET /health/ready`; requires the secret and a reachable store.
async fn health_ready(State(state): State<Arc<ServerState>>) -> Response {
    if !state.verifier.has_secret() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not ready", "reason": "WEBHOOK_SECRET not set"})),
        )
            .into_response();
    }
    if !state.store.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not ready", "reason": "database not ready"})),
        )
            .into_response();
    }
    Json(json!({"status": "ok"})).into_response()
}

/// Handles `GET /metrics` with Prometheus text exposition.
async fn metrics_text(State(state): State<Arc<ServerState>>) -> Response {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], state.metrics.render()).into_response()
}

/// Logs a storage fault and produces the generic 500 response.
fn storage_failure(
    state: &ServerState,
    meta: &RequestMeta,
    err: &msg_intake_core::StoreError,
) -> Response {
    state.log.record(&RequestLogEvent::error(&meta.request_id, format!("storage fault: {err}")));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "internal server error"})))
        .into_response()
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Intake HTTP server instance.
pub struct IntakeServer {
    /// Socket address to bind.
    bind: SocketAddr,
    /// Shared server state.
    state: Arc<ServerState>,
}

impl IntakeServer {
    /// Builds a server for the given bind address and state.
    #[must_use]
    pub const fn new(bind: SocketAddr, state: Arc<ServerState>) -> Self {
        Self {
            bind,
            state,
        }
    }

    /// Serves requests until the process terminates.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), IntakeServerError> {
        let app = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|err| IntakeServerError::Transport(format!("http bind failed: {err}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|err| IntakeServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Intake server errors.
#[derive(Debug, thiserror::Error)]
pub enum IntakeServerError {
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
