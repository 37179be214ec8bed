//! OAuth 2.1 records and request/response shapes.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Only token type issued.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// A dynamically registered OAuth client. Immutable once registered.
#[derive(Clone, Serialize)]
pub struct Client {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Unix seconds.
    #[serde(rename = "client_id_issued_at")]
    pub issued_at: i64,
    /// Unix seconds.
    #[serde(rename = "client_secret_expires_at")]
    pub secret_expires_at: i64,
}

impl Client {
    /// Exact-match check against the registered redirect targets.
    #[must_use]
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }

    /// Whether the client secret is past its expiry.
    #[must_use]
    pub fn secret_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.secret_expires_at
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .field("redirect_uris", &self.redirect_uris)
            .field("issued_at", &self.issued_at)
            .field("secret_expires_at", &self.secret_expires_at)
            .finish()
    }
}

/// Client metadata submitted for dynamic registration (RFC 7591 §2).
///
/// Unrecognized metadata fields are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientMetadata {
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    pub scope: Option<String>,
}

impl ClientMetadata {
    /// Metadata with a name and redirect targets.
    #[must_use]
    pub fn new(client_name: impl Into<String>, redirect_uris: Vec<String>) -> Self {
        Self { client_name: Some(client_name.into()), redirect_uris, scope: None }
    }
}

/// An authorization code issued by `authorize`.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub client_id: String,
    pub code_challenge: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl AuthorizationCode {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An issued access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An issued refresh token. Valid for exactly one successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Parameters of an approved authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizeParams {
    pub code_challenge: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub state: Option<String>,
}

/// Where to send the user agent after `authorize`: HTTP 302 to `location`.
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub location: String,
}

/// What the token endpoint needs to know about a pending code before
/// exchanging it.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub code_challenge: String,
    pub redirect_uri: String,
}

/// Successful token endpoint response body (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub scope: String,
}

/// Grant information returned by a successful access token verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    pub token: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Unix seconds.
    pub expires_at: i64,
}

/// Token revocation request (RFC 7009 §2.1).
#[derive(Debug, Clone, Deserialize)]
pub struct RevocationRequest {
    pub token: String,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

impl RevocationRequest {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), token_type_hint: None }
    }
}

/// Split a space-delimited scope string, dropping duplicates but keeping
/// first-seen order.
#[must_use]
pub fn parse_scope(scope: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for s in scope.split_whitespace() {
        if !scopes.iter().any(|existing| existing == s) {
            scopes.push(s.to_owned());
        }
    }
    scopes
}

/// Join scopes with single spaces, in their given order.
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// `now + ttl`, saturating at the latest representable instant.
pub(crate) fn deadline(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
