// msg-intake-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end coverage of the intake HTTP surface.
// Purpose: Exercise ingestion, retrieval, stats, health, and metrics over TCP.
// Dependencies: msg-intake-server test helpers, reqwest, serde_json, tokio
// ============================================================================

//! ## Overview
//! End-to-end tests driving a spawned intake server over loopback HTTP:
//! the signed ingestion matrix, idempotent replays, pagination and filter
//! validation, statistics consistency, health probes, and the Prometheus
//! exposition.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

mod common;

use common::TEST_SECRET;
use common::TestServer;
use common::sign;
use common::spawn_server;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn message_body(id: &str, from: &str, ts: &str, text: Option<&str>) -> Vec<u8> {
    let mut value = json!({
        "message_id": id,
        "from": from,
        "to": "+14155550100",
        "ts": ts,
    });
    if let Some(text) = text {
        value["text"] = Value::String(text.to_string());
    }
    serde_json::to_vec(&value).unwrap()
}

async fn post_webhook(
    client: &Client,
    server: &TestServer,
    body: Vec<u8>,
    signature: Option<String>,
) -> reqwest::Response {
    let mut request = client
        .post(format!("{}/webhook", server.base_url))
        .header("Content-Type", "application/json")
        .body(body);
    if let Some(signature) = signature {
        request = request.header("X-Signature", signature);
    }
    request.send().await.unwrap()
}

async fn get_json(client: &Client, server: &TestServer, path: &str) -> (StatusCode, Value) {
    let response = client.get(format!("{}{path}", server.base_url)).send().await.unwrap();
    let status = response.status();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

// ============================================================================
// SECTION: Ingestion
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn valid_signed_message_is_created() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body =
        br#"{"message_id":"m1","from":"+1555","to":"+1666","ts":"2025-01-15T10:00:00Z"}"#.to_vec();
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    let (status, listing) = get_json(&client, &server, "/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["data"][0]["message_id"], "m1");
    assert_eq!(listing["data"][0]["from"], "+1555");
}

#[tokio::test(flavor = "multi_thread")]
async fn replayed_message_stays_single_row() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("m_dup", "+919876543210", "2025-01-15T10:00:00Z", Some("Hello"));
    let signature = sign(&body);

    let first = post_webhook(&client, &server, body.clone(), Some(signature.clone())).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    let (_, listing) = get_json(&client, &server, "/messages").await;
    assert_eq!(listing["total"], 1);

    let rendered = server.state.metrics.render();
    assert!(rendered.contains("webhook_requests_total{result=\"created\"} 1"));
    assert!(rendered.contains("webhook_requests_total{result=\"duplicate\"} 1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_signature_header_returns_401() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("m2", "+919876543210", "2025-01-15T10:00:00Z", Some("Hello"));

    let response = post_webhook(&client, &server, body, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "invalid signature"})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_signature_returns_401() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("m3", "+919876543210", "2025-01-15T10:00:00Z", Some("Hello"));

    let response = post_webhook(&client, &server, body, Some("invalid123".to_string())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_secret_returns_503() {
    let server = spawn_server(None).await;
    let client = Client::new();
    let body = message_body("m4", "+919876543210", "2025-01-15T10:00:00Z", None);
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"detail": "server not ready"}));

    let rendered = server.state.metrics.render();
    assert!(rendered.contains("webhook_requests_total{result=\"server_error\"} 1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_json_returns_422() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = b"not valid json".to_vec();
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"detail": "Invalid JSON"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_from_returns_structured_detail() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("m5", "9876543210", "2025-01-15T10:00:00Z", None);
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = response.json::<Value>().await.unwrap();
    let detail = payload["detail"].as_array().unwrap();
    assert_eq!(detail[0]["loc"], json!(["body", "from"]));
    assert!(detail[0]["msg"].as_str().unwrap().contains("E.164"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_message_id_returns_422() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("", "+919876543210", "2025-01-15T10:00:00Z", None);
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_timestamp_returns_422() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("m6", "+919876543210", "2025-01-15 10:00:00", None);
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread")]
async fn text_too_long_returns_422() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let text = "x".repeat(4097);
    let body = message_body("m7", "+919876543210", "2025-01-15T10:00:00Z", Some(&text));
    let signature = sign(&body);

    let response = post_webhook(&client, &server, body, Some(signature)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// SECTION: Retrieval
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn messages_are_ordered_and_filterable() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    for (id, from, ts, text) in [
        ("m_b", "+1555", "2025-01-15T10:00:02Z", "beta"),
        ("m_z", "+1555", "2025-01-15T10:00:01Z", "zeta"),
        ("m_a", "+1666", "2025-01-15T10:00:01Z", "alpha"),
    ] {
        let body = message_body(id, from, ts, Some(text));
        let signature = sign(&body);
        let response = post_webhook(&client, &server, body, Some(signature)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let (_, listing) = get_json(&client, &server, "/messages").await;
    assert_eq!(listing["total"], 3);
    let ids: Vec<&str> = listing["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["message_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["m_a", "m_z", "m_b"]);

    let (_, filtered) = get_json(&client, &server, "/messages?from=%2B1555").await;
    assert_eq!(filtered["total"], 2);

    let (_, searched) = get_json(&client, &server, "/messages?q=alpha").await;
    assert_eq!(searched["total"], 1);
    assert_eq!(searched["data"][0]["message_id"], "m_a");

    let (_, paged) = get_json(&client, &server, "/messages?limit=1&offset=1").await;
    assert_eq!(paged["total"], 3);
    assert_eq!(paged["data"].as_array().unwrap().len(), 1);
    assert_eq!(paged["data"][0]["message_id"], "m_z");
    assert_eq!(paged["limit"], 1);
    assert_eq!(paged["offset"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_bounds_violations_return_422() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    for path in ["/messages?limit=150", "/messages?limit=0", "/messages?offset=-1"] {
        let (status, payload) = get_json(&client, &server, path).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "path: {path}");
        assert!(payload["detail"].is_array());
    }
}

// ============================================================================
// SECTION: Statistics
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn stats_totals_are_consistent() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    for (id, from, ts) in [
        ("m1", "+1555", "2025-01-15T10:00:00Z"),
        ("m2", "+1555", "2025-01-17T10:00:00Z"),
        ("m3", "+1666", "2025-01-16T10:00:00Z"),
    ] {
        let body = message_body(id, from, ts, None);
        let signature = sign(&body);
        post_webhook(&client, &server, body, Some(signature)).await;
    }

    let (status, stats) = get_json(&client, &server, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_messages"], 3);
    assert_eq!(stats["senders_count"], 2);
    assert_eq!(stats["first_message_ts"], "2025-01-15T10:00:00Z");
    assert_eq!(stats["last_message_ts"], "2025-01-17T10:00:00Z");
    let per_sender = stats["messages_per_sender"].as_array().unwrap();
    assert!(per_sender.len() <= 10);
    let summed: u64 = per_sender.iter().map(|entry| entry["count"].as_u64().unwrap()).sum();
    assert_eq!(summed, 3);
    assert_eq!(per_sender[0]["from"], "+1555");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_stats_report_nulls() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let (_, stats) = get_json(&client, &server, "/stats").await;
    assert_eq!(stats["total_messages"], 0);
    assert!(stats["first_message_ts"].is_null());
    assert!(stats["last_message_ts"].is_null());
}

// ============================================================================
// SECTION: Health & Metrics
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn health_live_is_always_ok() {
    let server = spawn_server(None).await;
    let client = Client::new();
    let (status, body) = get_json(&client, &server, "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn readiness_requires_secret() {
    let server = spawn_server(None).await;
    let client = Client::new();
    let (status, body) = get_json(&client, &server, "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "WEBHOOK_SECRET not set");
}

#[tokio::test(flavor = "multi_thread")]
async fn readiness_ok_with_secret_and_store() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let (status, body) = get_json(&client, &server, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_exposition_covers_counters_and_histogram() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let body = message_body("m1", "+1555", "2025-01-15T10:00:00Z", None);
    let signature = sign(&body);
    post_webhook(&client, &server, body, Some(signature)).await;
    let _ = get_json(&client, &server, "/messages").await;

    let response = client.get(format!("{}/metrics", server.base_url)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    assert!(text.contains("http_requests_total{path=\"/webhook\",status=\"200\"} 1"));
    assert!(text.contains("http_requests_total{path=\"/messages\",status=\"200\"} 1"));
    assert!(text.contains("webhook_requests_total{result=\"created\"} 1"));
    assert!(text.contains("request_latency_ms_bucket{le=\"10\"}"));
    assert!(text.contains("request_latency_ms_bucket{le=\"+Inf\"} 2"));
    assert!(text.contains("request_latency_ms_count 2"));
    assert!(text.contains("request_latency_ms_sum"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sqlite_backed_ingestion_survives_server_restart() {
    use msg_intake_core::SharedMessageStore;
    use msg_intake_store_sqlite::SqliteMessageStore;
    use msg_intake_store_sqlite::SqliteStoreConfig;

    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("intake.sqlite");
    let client = Client::new();
    let body = message_body("m_durable", "+1555", "2025-01-15T10:00:00Z", Some("kept"));
    let signature = sign(&body);

    {
        let store = SqliteMessageStore::new(SqliteStoreConfig::for_path(&path)).unwrap();
        let server =
            common::spawn_server_with_store(Some(TEST_SECRET), SharedMessageStore::from_store(store))
                .await;
        let response = post_webhook(&client, &server, body, Some(signature)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let store = SqliteMessageStore::new(SqliteStoreConfig::for_path(&path)).unwrap();
    let server = common::spawn_server_with_store(
        Some(TEST_SECRET),
        SharedMessageStore::from_store(store),
    )
    .await;
    let (_, listing) = get_json(&client, &server, "/messages").await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["data"][0]["message_id"], "m_durable");
    assert_eq!(listing["data"][0]["text"], "kept");
}

#[tokio::test(flavor = "multi_thread")]
async fn responses_carry_request_id_header() {
    let server = spawn_server(Some(TEST_SECRET)).await;
    let client = Client::new();
    let response =
        client.get(format!("{}/health/live", server.base_url)).send().await.unwrap();
    let request_id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(request_id.len(), 8);
}
