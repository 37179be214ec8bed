//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements S256 code challenge verification per RFC 7636.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::secrets::constant_time_eq;

/// Only supported challenge method.
pub const S256: &str = "S256";

/// Derive the S256 challenge for a verifier: `BASE64URL(SHA256(code_verifier))`.
#[must_use]
pub fn challenge_s256(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Verify a PKCE S256 code challenge.
///
/// RFC 7636 §4.1 bounds the verifier to 43..=128 characters; anything outside
/// that range never verifies.
#[must_use]
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    if !(43..=128).contains(&code_verifier.len()) {
        return false;
    }
    constant_time_eq(&challenge_s256(code_verifier), code_challenge)
}
