// msg-intake-core/src/message.rs
// ============================================================================
// Module: Msg Intake Message Types
// Description: Persisted message entity and the raw inbound webhook payload.
// Purpose: Separate untrusted wire input from the validated domain entity.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`InboundMessage`] is the loosely typed webhook payload as parsed from
//! JSON; every field is optional so that missing fields surface as structured
//! validation errors rather than parse failures. [`Message`] is the validated
//! entity handed to the store, carrying the server-assigned ingestion time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;

use crate::identifiers::MessageId;

// ============================================================================
// SECTION: Inbound Payload
// ============================================================================

/// Raw webhook payload prior to validation.
///
/// # Invariants
/// - Fields are unvalidated, untrusted input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    /// Externally supplied idempotency key.
    pub message_id: Option<String>,
    /// Sender address, expected in E.164 format.
    #[serde(rename = "from")]
    pub from_address: Option<String>,
    /// Recipient address, expected in E.164 format.
    #[serde(rename = "to")]
    pub to_address: Option<String>,
    /// Message timestamp, expected as strict ISO-8601 UTC.
    #[serde(rename = "ts")]
    pub timestamp: Option<String>,
    /// Optional message body.
    pub text: Option<String>,
}

// ============================================================================
// SECTION: Persisted Entity
// ============================================================================

/// Validated message entity persisted by the store.
///
/// # Invariants
/// - All fields have passed [`crate::validate::validate_inbound`].
/// - `ingested_at` is server-assigned and never client-controlled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier and idempotency key.
    pub message_id: MessageId,
    /// Sender address in E.164 format.
    pub from_address: String,
    /// Recipient address in E.164 format.
    pub to_address: String,
    /// Client-supplied timestamp in `YYYY-MM-DDTHH:MM:SSZ` form.
    pub timestamp: String,
    /// Optional message body, at most [`crate::validate::MAX_TEXT_CHARS`] characters.
    pub text: Option<String>,
    /// Server-assigned ingestion time in `YYYY-MM-DDTHH:MM:SSZ` form.
    pub ingested_at: String,
}
