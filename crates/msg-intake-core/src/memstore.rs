// msg-intake-core/src/memstore.rs
// ============================================================================
// Module: Msg Intake In-Memory Store
// Description: Simple in-memory message store for tests and local runs.
// Purpose: Provide a reference MessageStore implementation without external deps.
// Dependencies: crate::interfaces, crate::message
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of [`MessageStore`]
//! for tests and non-durable local runs. It mirrors the SQLite store's
//! ordering, filter, and statistics semantics exactly so the two backends are
//! interchangeable in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::interfaces::InsertOutcome;
use crate::interfaces::MessagePage;
use crate::interfaces::MessageQuery;
use crate::interfaces::MessageStore;
use crate::interfaces::SenderCount;
use crate::interfaces::StoreError;
use crate::interfaces::StoreStats;
use crate::interfaces::TOP_SENDERS_LIMIT;
use crate::message::Message;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory message store keyed by `message_id`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMessageStore {
    /// Message map protected by a mutex.
    messages: Arc<Mutex<BTreeMap<String, Message>>>,
}

impl InMemoryMessageStore {
    /// Creates a new empty in-memory message store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl MessageStore for InMemoryMessageStore {
    fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| StoreError::Store("message store mutex poisoned".to_string()))?;
        if guard.contains_key(message.message_id.as_str()) {
            return Ok(InsertOutcome::Duplicate);
        }
        guard.insert(message.message_id.as_str().to_string(), message.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn query(&self, query: &MessageQuery) -> Result<MessagePage, StoreError> {
        let guard = self
            .messages
            .lock()
            .map_err(|_| StoreError::Store("message store mutex poisoned".to_string()))?;
        let mut matching: Vec<Message> =
            guard.values().filter(|message| matches_filters(message, query)).cloned().collect();
        matching.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.message_id.as_str().cmp(b.message_id.as_str()))
        });
        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let messages: Vec<Message> =
            matching.into_iter().skip(offset).take(query.limit as usize).collect();
        Ok(MessagePage {
            messages,
            total,
        })
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let guard = self
            .messages
            .lock()
            .map_err(|_| StoreError::Store("message store mutex poisoned".to_string()))?;
        let total_messages = guard.len() as u64;
        let mut per_sender: BTreeMap<String, u64> = BTreeMap::new();
        let mut first_message_ts: Option<String> = None;
        let mut last_message_ts: Option<String> = None;
        for message in guard.values() {
            *per_sender.entry(message.from_address.clone()).or_insert(0) += 1;
            if first_message_ts.as_deref().is_none_or(|first| message.timestamp.as_str() < first) {
                first_message_ts = Some(message.timestamp.clone());
            }
            if last_message_ts.as_deref().is_none_or(|last| message.timestamp.as_str() > last) {
                last_message_ts = Some(message.timestamp.clone());
            }
        }
        let senders_count = per_sender.len() as u64;
        let mut messages_per_sender: Vec<SenderCount> = per_sender
            .into_iter()
            .map(|(from_address, count)| SenderCount {
                from_address,
                count,
            })
            .collect();
        // Count descending; the BTreeMap already yields senders ascending,
        // and the stable sort preserves that order for equal counts.
        messages_per_sender.sort_by(|a, b| b.count.cmp(&a.count));
        messages_per_sender.truncate(TOP_SENDERS_LIMIT);
        Ok(StoreStats {
            total_messages,
            senders_count,
            messages_per_sender,
            first_message_ts,
            last_message_ts,
        })
    }

    fn is_ready(&self) -> bool {
        self.messages.lock().is_ok()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Applies the AND-combined query filters to one message.
fn matches_filters(message: &Message, query: &MessageQuery) -> bool {
    if let Some(from_address) = query.from_address.as_deref() {
        if message.from_address != from_address {
            return false;
        }
    }
    if let Some(since) = query.since.as_deref() {
        if message.timestamp.as_str() < since {
            return false;
        }
    }
    if let Some(needle) = query.text_contains.as_deref() {
        match message.text.as_deref() {
            Some(text) if text.contains(needle) => {}
            _ => return false,
        }
    }
    true
}
