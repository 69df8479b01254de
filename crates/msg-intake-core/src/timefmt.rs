// msg-intake-core/src/timefmt.rs
// ============================================================================
// Module: Msg Intake Timestamp Handling
// Description: Strict ISO-8601 UTC timestamp parsing and formatting.
// Purpose: Enforce the YYYY-MM-DDTHH:MM:SSZ wire format for message times.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! Message timestamps travel as `YYYY-MM-DDTHH:MM:SSZ` strings. Parsing is
//! strict: the digit shape must match exactly and the value must be a real
//! calendar instant (month 13 or February 30 are rejected even though they
//! match the digit shape). Server-assigned times are produced in the same
//! format at second precision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire format for message timestamps: strict ISO-8601 UTC with `Z` suffix.
const UTC_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Exact byte length of a well-formed timestamp string.
const UTC_TIMESTAMP_LEN: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parse errors.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// Input does not match the `YYYY-MM-DDTHH:MM:SSZ` digit shape.
    #[error("timestamp does not match YYYY-MM-DDTHH:MM:SSZ")]
    Shape,
    /// Input matches the shape but is not a valid calendar instant.
    #[error("timestamp is not a valid calendar instant")]
    Calendar,
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a strict ISO-8601 UTC timestamp string.
///
/// # Errors
///
/// Returns [`TimestampError`] when the shape or calendar check fails.
pub fn parse_utc(value: &str) -> Result<PrimitiveDateTime, TimestampError> {
    if !matches_utc_shape(value) {
        return Err(TimestampError::Shape);
    }
    PrimitiveDateTime::parse(value, UTC_FORMAT).map_err(|_| TimestampError::Calendar)
}

/// Returns true when the input matches the `YYYY-MM-DDTHH:MM:SSZ` digit shape.
#[must_use]
pub fn matches_utc_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != UTC_TIMESTAMP_LEN {
        return false;
    }
    for (index, byte) in bytes.iter().enumerate() {
        let ok = match index {
            4 | 7 => *byte == b'-',
            10 => *byte == b'T',
            13 | 16 => *byte == b':',
            19 => *byte == b'Z',
            _ => byte.is_ascii_digit(),
        };
        if !ok {
            return false;
        }
    }
    true
}

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Formats a UTC instant in the wire format, truncated to second precision.
#[must_use]
pub fn format_utc(instant: OffsetDateTime) -> String {
    let utc = instant.to_offset(time::UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
        .format(UTC_FORMAT)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Returns the current UTC time in the wire format.
#[must_use]
pub fn now_utc_string() -> String {
    format_utc(OffsetDateTime::now_utc())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
