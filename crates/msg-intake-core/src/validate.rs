// msg-intake-core/src/validate.rs
// ============================================================================
// Module: Msg Intake Payload Validation
// Description: Schema and format validation for inbound webhook payloads.
// Purpose: Produce structured per-field errors for untrusted input.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Validation turns an untrusted [`InboundMessage`] into a [`Message`] or a
//! structured list of per-field errors. All field failures are collected in
//! one pass so callers can surface actionable detail instead of a single
//! opaque string. Malformed JSON is a distinct failure mode handled at the
//! transport boundary, not here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::identifiers::MessageId;
use crate::message::InboundMessage;
use crate::message::Message;
use crate::timefmt;
use crate::timefmt::TimestampError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of characters allowed in the optional `text` field.
pub const MAX_TEXT_CHARS: usize = 4096;

/// Stable error category for a missing required field.
const KIND_MISSING: &str = "missing";
/// Stable error category for a value that fails a format rule.
const KIND_VALUE: &str = "value_error";
/// Stable error category for an overlong string.
const KIND_TOO_LONG: &str = "string_too_long";

// ============================================================================
// SECTION: Field Errors
// ============================================================================

/// One structured validation error tied to a field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the offending field, e.g. `["body", "from"]`.
    pub loc: Vec<String>,
    /// Human-readable failure message.
    pub msg: String,
    /// Stable error category label.
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    /// Builds a field error for a body field.
    fn body(field: &str, msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }
}

/// Non-empty list of per-field validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field error(s)", self.0.len())
    }
}

impl ValidationErrors {
    /// Returns the contained field errors.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates an inbound payload and produces the persisted entity.
///
/// The `ingested_at` value is assigned by the caller (server clock), never
/// taken from the payload.
///
/// # Errors
///
/// Returns [`ValidationErrors`] listing every failing field.
pub fn validate_inbound(
    payload: &InboundMessage,
    ingested_at: String,
) -> Result<Message, ValidationErrors> {
    let mut errors = Vec::new();

    let message_id = match payload.message_id.as_deref() {
        None => {
            errors.push(FieldError::body("message_id", "field required", KIND_MISSING));
            None
        }
        Some("") => {
            errors.push(FieldError::body(
                "message_id",
                "message_id must be non-empty",
                KIND_VALUE,
            ));
            None
        }
        Some(id) => Some(MessageId::new(id)),
    };

    let from_address = validate_address(&mut errors, "from", payload.from_address.as_deref());
    let to_address = validate_address(&mut errors, "to", payload.to_address.as_deref());
    let timestamp = validate_timestamp(&mut errors, payload.timestamp.as_deref());

    if let Some(text) = payload.text.as_deref() {
        if text.chars().count() > MAX_TEXT_CHARS {
            errors.push(FieldError::body(
                "text",
                format!("text must be at most {MAX_TEXT_CHARS} characters"),
                KIND_TOO_LONG,
            ));
        }
    }

    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }
    match (message_id, from_address, to_address, timestamp) {
        (Some(message_id), Some(from_address), Some(to_address), Some(timestamp)) => Ok(Message {
            message_id,
            from_address,
            to_address,
            timestamp,
            text: payload.text.clone(),
            ingested_at,
        }),
        _ => Err(ValidationErrors(vec![FieldError::body(
            "body",
            "payload validation failed",
            KIND_VALUE,
        )])),
    }
}

// ============================================================================
// SECTION: Field Rules
// ============================================================================

/// Validates an E.164 address field, recording errors in place.
fn validate_address(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<&str>,
) -> Option<String> {
    let Some(value) = value else {
        errors.push(FieldError::body(field, "field required", KIND_MISSING));
        return None;
    };
    if is_e164(value) {
        Some(value.to_string())
    } else {
        errors.push(FieldError::body(
            field,
            format!("{field} must be in E.164 format (start with +, then digits only)"),
            KIND_VALUE,
        ));
        None
    }
}

/// Validates the strict ISO-8601 UTC timestamp field, recording errors in place.
fn validate_timestamp(errors: &mut Vec<FieldError>, value: Option<&str>) -> Option<String> {
    let Some(value) = value else {
        errors.push(FieldError::body("ts", "field required", KIND_MISSING));
        return None;
    };
    match timefmt::parse_utc(value) {
        Ok(_) => Some(value.to_string()),
        Err(TimestampError::Shape) => {
            errors.push(FieldError::body(
                "ts",
                "ts must be ISO-8601 UTC format with Z suffix (e.g., 2025-01-15T10:00:00Z)",
                KIND_VALUE,
            ));
            None
        }
        Err(TimestampError::Calendar) => {
            errors.push(FieldError::body("ts", "ts must be a valid datetime", KIND_VALUE));
            None
        }
    }
}

/// Returns true for `+` followed by one or more ASCII digits.
#[must_use]
pub fn is_e164(value: &str) -> bool {
    let bytes = value.as_bytes();
    match bytes.split_first() {
        Some((b'+', digits)) if !digits.is_empty() => digits.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}
