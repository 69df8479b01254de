// msg-intake-server/src/auth.rs
// ============================================================================
// Module: Webhook Signature Verification
// Description: HMAC-SHA256 request authenticity checks against a shared secret.
// Purpose: Provide strict, fail-closed signature verification for ingestion.
// Dependencies: hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Inbound webhook requests carry a lowercase-hex HMAC-SHA256 of the exact
//! raw body bytes in the `X-Signature` header. Verification is fail-closed:
//! a missing secret, a missing header, or any malformed signature simply
//! compares unequal. The comparison itself is constant-time to avoid timing
//! side-channels on the secret-derived digest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// HMAC-SHA256 signature type for webhook bodies.
type HmacSha256 = Hmac<Sha256>;

/// Verifies webhook signatures against the configured shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    /// Shared secret bytes, absent when ingestion must fail closed.
    secret: Option<Vec<u8>>,
}

impl SignatureVerifier {
    /// Builds a verifier from an optional shared secret.
    #[must_use]
    pub fn from_secret(secret: Option<String>) -> Self {
        Self {
            secret: secret.map(String::into_bytes),
        }
    }

    /// Returns true when a shared secret is configured.
    #[must_use]
    pub const fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Verifies a supplied signature over the exact raw body bytes.
    ///
    /// Returns false when no secret is configured, the signature is absent,
    /// or the hex digests differ. Never panics on malformed input.
    #[must_use]
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            return false;
        };
        let Some(signature) = signature else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return false;
        };
        mac.update(body);
        let expected = hex_encode(&mac.finalize().into_bytes());
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

// ============================================================================
// SECTION: Constant-Time Comparison
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Computes the lowercase-hex HMAC-SHA256 of a body under a secret.
///
/// Exposed for clients and tests that need to produce valid signatures.
#[must_use]
pub fn sign_body(secret: &[u8], body: &[u8]) -> String {
    HmacSha256::new_from_slice(secret).map_or_else(
        |_| String::new(),
        |mut mac| {
            mac.update(body);
            hex_encode(&mac.finalize().into_bytes())
        },
    )
}
