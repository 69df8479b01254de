// msg-intake-core/src/interfaces.rs
// ============================================================================
// Module: Msg Intake Interfaces
// Description: Backend-agnostic message store interface and result types.
// Purpose: Define the persistence contract used by the ingestion service.
// Dependencies: crate::message, serde, thiserror
// ============================================================================

//! ## Overview
//! The [`MessageStore`] interface defines idempotent insertion, filtered and
//! paginated retrieval, aggregate statistics, and readiness probing without
//! embedding backend-specific details. Duplicate-key insertion is a normal
//! outcome under at-least-once delivery and is reported through
//! [`InsertOutcome`], never as an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::message::Message;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Smallest accepted page size.
pub const MIN_PAGE_LIMIT: u32 = 1;
/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;
/// Maximum number of senders reported by [`StoreStats::messages_per_sender`].
pub const TOP_SENDERS_LIMIT: usize = 10;

// ============================================================================
// SECTION: Outcomes & Errors
// ============================================================================

/// Result of an idempotent insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created.
    Inserted,
    /// A row with the same `message_id` already existed; nothing changed.
    Duplicate,
}

/// Message store errors. Duplicate keys are never reported here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("message store io error: {0}")]
    Io(String),
    /// Store engine error.
    #[error("message store error: {0}")]
    Store(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("message store corruption: {0}")]
    Corrupt(String),
    /// Store data or configuration is invalid.
    #[error("message store invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Query Types
// ============================================================================

/// Filtered, paginated retrieval request. Filters combine with logical AND.
///
/// # Invariants
/// - `limit` is caller-clamped to `[MIN_PAGE_LIMIT, MAX_PAGE_LIMIT]`.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    /// Page size.
    pub limit: u32,
    /// Number of matching rows to skip.
    pub offset: u64,
    /// Exact-match filter on the sender address.
    pub from_address: Option<String>,
    /// Inclusive lower bound on the message timestamp.
    pub since: Option<String>,
    /// Substring filter on the message text.
    pub text_contains: Option<String>,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            from_address: None,
            since: None,
            text_contains: None,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct MessagePage {
    /// Messages in `(timestamp ASC, message_id ASC)` order.
    pub messages: Vec<Message>,
    /// Total rows matching the filters, independent of `limit`/`offset`.
    pub total: u64,
}

// ============================================================================
// SECTION: Statistics
// ============================================================================

/// Per-sender message count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    /// Sender address.
    #[serde(rename = "from")]
    pub from_address: String,
    /// Number of messages stored for the sender.
    pub count: u64,
}

/// Aggregate statistics across all stored messages.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Total number of stored messages.
    pub total_messages: u64,
    /// Number of distinct sender addresses.
    pub senders_count: u64,
    /// Top senders by message count descending, at most
    /// [`TOP_SENDERS_LIMIT`] entries; equal counts break by sender ascending.
    pub messages_per_sender: Vec<SenderCount>,
    /// Earliest message timestamp, `None` when the store is empty.
    pub first_message_ts: Option<String>,
    /// Latest message timestamp, `None` when the store is empty.
    pub last_message_ts: Option<String>,
}

// ============================================================================
// SECTION: Message Store
// ============================================================================

/// Message store for idempotent persistence and retrieval.
pub trait MessageStore: Send + Sync {
    /// Inserts a message idempotently.
    ///
    /// A pre-existing row with the same `message_id` yields
    /// [`InsertOutcome::Duplicate`] and leaves the first writer's values
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only for genuine storage faults.
    fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError>;

    /// Retrieves a filtered, ordered page of messages plus the filtered total.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn query(&self, query: &MessageQuery) -> Result<MessagePage, StoreError>;

    /// Computes aggregate statistics across all messages.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the aggregation fails.
    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Returns true iff the store is reachable and its schema exists.
    ///
    /// Never raises; failures report as `false`.
    fn is_ready(&self) -> bool;
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared message store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedMessageStore {
    /// Inner store implementation.
    inner: Arc<dyn MessageStore>,
}

impl SharedMessageStore {
    /// Wraps a message store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl MessageStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl MessageStore for SharedMessageStore {
    fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        self.inner.insert(message)
    }

    fn query(&self, query: &MessageQuery) -> Result<MessagePage, StoreError> {
        self.inner.query(query)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats()
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}
