//! Error types for the OAuth authority.
//!
//! Uses `thiserror` for structured error handling. Every variant is
//! recoverable by the caller (re-authorize, retry later, request fewer
//! scopes); none of them should ever bring the server down.
//!
//! Display strings are safe to return to clients: they never contain a
//! token, an authorization code, or a client secret.

use axum::http::StatusCode;

/// Errors from the authorization server core and its HTTP surface.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// Authorization code or refresh token is unknown, expired, or already used.
    #[error("Invalid, expired, or already used grant")]
    InvalidGrant,

    /// The grant exists but was issued to a different client.
    #[error("Grant was issued to another client")]
    ClientMismatch,

    /// Refresh requested scopes outside the original grant.
    #[error("Requested scope exceeds the original grant")]
    InvalidScope,

    /// Access token is on the revocation list.
    #[error("Access token has been revoked")]
    TokenRevoked,

    /// Access token is past its expiry.
    #[error("Access token has expired")]
    TokenExpired,

    /// Access token is simply unknown.
    #[error("Invalid access token")]
    InvalidToken,

    /// Client registration rate exceeded.
    #[error("Client registration rate limit exceeded, retry later")]
    RateLimitExceeded,

    /// The live client ceiling has been reached.
    #[error("Maximum number of registered clients reached")]
    ClientCapExceeded,

    /// Unknown client, wrong secret, or expired secret.
    #[error("Client authentication failed")]
    InvalidClient,

    /// Redirect target is not registered for the client or does not parse.
    #[error("redirect_uri is not registered for this client")]
    InvalidRedirectUri,

    /// Registration metadata was rejected.
    #[error("Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Malformed request (missing or invalid parameter).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Grant type other than `authorization_code` or `refresh_token`.
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),
}

impl OAuthError {
    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid client metadata error.
    #[must_use]
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidClientMetadata(message.into())
    }

    /// Wire error code per RFC 6749 §5.2, RFC 6750 §3.1 and RFC 7591 §3.2.2.
    ///
    /// `ClientMismatch` shares `invalid_grant` with `InvalidGrant` on the
    /// wire; the two differ in their description.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidGrant | Self::ClientMismatch => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::TokenRevoked | Self::TokenExpired | Self::InvalidToken => "invalid_token",
            Self::RateLimitExceeded => "slow_down",
            Self::ClientCapExceeded => "temporarily_unavailable",
            Self::InvalidClient => "invalid_client",
            Self::InvalidRedirectUri => "invalid_redirect_uri",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenRevoked | Self::TokenExpired | Self::InvalidToken | Self::InvalidClient => {
                StatusCode::UNAUTHORIZED
            }
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::ClientCapExceeded => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns true if the caller can expect success by retrying the same
    /// request later without changing it.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ClientCapExceeded)
    }

    /// Returns true if this error came from bearer token verification.
    #[must_use]
    pub const fn is_token_error(&self) -> bool {
        matches!(self, Self::TokenRevoked | Self::TokenExpired | Self::InvalidToken)
    }
}

/// Result type alias for authority operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
