// msg-intake-core/tests/proptest_validate.rs
// ============================================================================
// Module: Validation Property Tests
// Description: Property-based checks for address and timestamp rules.
// Purpose: Ensure format validators hold across generated inputs.
// Dependencies: msg-intake-core, proptest
// ============================================================================

//! ## Overview
//! Property tests for the E.164 address check and the strict timestamp shape
//! check, exercising generated inputs well beyond the hand-written cases.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use msg_intake_core::timefmt;
use msg_intake_core::validate::is_e164;
use proptest::prelude::*;

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn plus_then_digits_is_always_accepted(digits in "[0-9]{1,15}") {
        let candidate = format!("+{}", digits);
        prop_assert!(is_e164(&candidate));
    }

    #[test]
    fn input_without_leading_plus_is_rejected(value in "[0-9a-zA-Z]{1,20}") {
        prop_assert!(!is_e164(&value));
    }

    #[test]
    fn any_non_digit_after_plus_is_rejected(
        prefix in "[0-9]{0,5}",
        junk in "[^0-9]",
        suffix in "[0-9]{0,5}",
    ) {
        let candidate = format!("+{}{}{}", prefix, junk, suffix);
        prop_assert!(!is_e164(&candidate));
    }

    #[test]
    fn valid_calendar_instants_round_trip_the_shape(
        year in 1970_i32..=2999,
        month in 1_u8..=12,
        day in 1_u8..=28,
        hour in 0_u8..=23,
        minute in 0_u8..=59,
        second in 0_u8..=59,
    ) {
        let value = format!(
            "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z"
        );
        prop_assert!(timefmt::matches_utc_shape(&value));
        prop_assert!(timefmt::parse_utc(&value).is_ok());
    }

    #[test]
    fn shape_mismatch_never_parses(value in "[0-9T:Z-]{0,19}") {
        // Any string shorter than the canonical form must fail the shape gate.
        prop_assert!(timefmt::parse_utc(&value).is_err());
    }
}
