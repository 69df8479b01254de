// msg-intake-server/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared helpers for end-to-end HTTP tests.
// Purpose: Spawn an in-process intake server and produce valid signatures.
// Dependencies: msg-intake-core, msg-intake-server, tokio
// ============================================================================

//! ## Overview
//! Spawns the intake router on an ephemeral loopback port with an in-memory
//! store and a silent log sink so each test runs against an isolated server.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use msg_intake_core::InMemoryMessageStore;
use msg_intake_core::SharedMessageStore;
use msg_intake_server::MetricsRegistry;
use msg_intake_server::NoopLogSink;
use msg_intake_server::ServerState;
use msg_intake_server::SignatureVerifier;
use msg_intake_server::auth::sign_body;
use msg_intake_server::build_router;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Shared secret used by the spawned test servers.
pub const TEST_SECRET: &str = "testsecret";

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Handle to a spawned in-process server.
pub struct TestServer {
    /// Base URL of the spawned server.
    pub base_url: String,
    /// Shared state for direct assertions.
    pub state: Arc<ServerState>,
}

/// Spawns an intake server with the given optional secret.
pub async fn spawn_server(secret: Option<&str>) -> TestServer {
    spawn_server_with_store(
        secret,
        SharedMessageStore::from_store(InMemoryMessageStore::new()),
    )
    .await
}

/// Spawns an intake server over an explicit store.
pub async fn spawn_server_with_store(
    secret: Option<&str>,
    store: SharedMessageStore,
) -> TestServer {
    let state = Arc::new(ServerState::new(
        SignatureVerifier::from_secret(secret.map(str::to_string)),
        store,
        Arc::new(MetricsRegistry::new()),
        Arc::new(NoopLogSink),
    ));
    let router = build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr: SocketAddr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    TestServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

/// Computes a valid webhook signature for the test secret.
pub fn sign(body: &[u8]) -> String {
    sign_body(TEST_SECRET.as_bytes(), body)
}
