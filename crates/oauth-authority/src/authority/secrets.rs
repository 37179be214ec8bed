//! Identifier and secret generation.
//!
//! All credentials are drawn from the thread-local CSPRNG and hex encoded in
//! lowercase. Nothing here is derived from the client, the clock, or any
//! other guessable input.

use rand::RngCore;
use subtle::ConstantTimeEq;

/// Prefix on every access token.
pub const ACCESS_TOKEN_PREFIX: &str = "vat_";
/// Prefix on every refresh token.
pub const REFRESH_TOKEN_PREFIX: &str = "vrt_";
/// Prefix on every client identifier.
pub const CLIENT_ID_PREFIX: &str = "client_";

/// Entropy in access and refresh tokens (64 hex chars).
const TOKEN_BYTES: usize = 32;
/// Entropy in client secrets (64 hex chars).
const CLIENT_SECRET_BYTES: usize = 32;
/// Entropy in authorization codes (32 hex chars).
const AUTH_CODE_BYTES: usize = 16;
/// Hex characters kept from the UUID in a client id.
const CLIENT_ID_HEX_LEN: usize = 16;

/// `n` random bytes, lowercase hex encoded.
fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `vat_` + 64 hex.
#[must_use]
pub fn generate_access_token() -> String {
    format!("{ACCESS_TOKEN_PREFIX}{}", random_hex(TOKEN_BYTES))
}

/// `vrt_` + 64 hex.
#[must_use]
pub fn generate_refresh_token() -> String {
    format!("{REFRESH_TOKEN_PREFIX}{}", random_hex(TOKEN_BYTES))
}

/// 32 hex characters, single use.
#[must_use]
pub fn generate_auth_code() -> String {
    random_hex(AUTH_CODE_BYTES)
}

/// Client id prefix + 16 hex characters taken from a v4 UUID.
///
/// Uniqueness within the process is enforced by the registry, which
/// regenerates on collision.
#[must_use]
pub fn generate_client_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{CLIENT_ID_PREFIX}{}", &uuid[..CLIENT_ID_HEX_LEN])
}

/// 64 hex characters, shown to the client once at registration.
#[must_use]
pub fn generate_client_secret() -> String {
    random_hex(CLIENT_SECRET_BYTES)
}

/// Compare two secrets in time independent of where they first differ.
///
/// Inputs of differing length are rejected before any byte is compared.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
