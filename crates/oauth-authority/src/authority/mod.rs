//! OAuth 2.1 authorization server core.
//!
//! An [`AuthorizationServer`] is an explicit value: construct one per
//! process (or per test) and hand out `Arc` handles. It owns every mutable
//! table; there is no module-level state.
//!
//! ## Supported Standards
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code and Refresh Token grants
//! - RFC 7009: Token Revocation
//!
//! ## Atomicity
//! Codes, tokens and the revocation set live behind a single lock. "Check
//! the code is unconsumed, then mark it consumed" and "check the refresh
//! token is live, then delete and reissue" each run under one write guard,
//! so concurrent exchanges of the same grant yield exactly one winner.

mod codes;
pub mod pkce;
pub mod registry;
pub mod secrets;
mod tokens;
pub mod types;
mod verify;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::AuthorityConfig;
use crate::error::OAuthResult;

pub use registry::ClientRegistry;
pub use types::{
    AuthInfo, AuthorizationRedirect, AuthorizeParams, Client, ClientMetadata,
    PendingAuthorization, RevocationRequest, TokenResponse,
};
pub use verify::TokenVerifier;

use types::{AccessToken, AuthorizationCode, RefreshToken};

/// Grant state guarded as one unit.
#[derive(Default)]
struct GrantTables {
    codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, AccessToken>,
    refresh_tokens: HashMap<String, RefreshToken>,
    /// Revoked access tokens, with the instant they would have expired.
    revoked: HashMap<String, DateTime<Utc>>,
}

/// Live record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthorityStats {
    pub clients: usize,
    pub authorization_codes: usize,
    pub access_tokens: usize,
    pub refresh_tokens: usize,
    pub revoked_tokens: usize,
}

/// Embedded authorization server.
pub struct AuthorizationServer {
    config: AuthorityConfig,
    clients: ClientRegistry,
    grants: RwLock<GrantTables>,
}

impl AuthorizationServer {
    #[must_use]
    pub fn new(config: AuthorityConfig) -> Self {
        Self {
            clients: ClientRegistry::new(&config),
            config,
            grants: RwLock::new(GrantTables::default()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Register a new client (Dynamic Client Registration).
    pub async fn register_client(&self, metadata: ClientMetadata) -> OAuthResult<Client> {
        self.clients.register(metadata).await
    }

    /// Look up a client by id.
    pub async fn get_client(&self, client_id: &str) -> Option<Client> {
        self.clients.get(client_id).await
    }

    /// Authenticate a client by id and secret.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> OAuthResult<Client> {
        self.clients.authenticate(client_id, client_secret).await
    }

    /// Drop expired codes and tokens, and forget revocations of tokens that
    /// would have expired anyway. Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut grants = self.grants.write().await;

        let before = grants.codes.len()
            + grants.access_tokens.len()
            + grants.refresh_tokens.len()
            + grants.revoked.len();

        grants.codes.retain(|_, code| !code.is_expired(now));
        grants.access_tokens.retain(|_, token| !token.is_expired(now));
        grants.refresh_tokens.retain(|_, token| !token.is_expired(now));
        grants.revoked.retain(|_, expires_at| now < *expires_at);

        let after = grants.codes.len()
            + grants.access_tokens.len()
            + grants.refresh_tokens.len()
            + grants.revoked.len();

        let removed = before - after;
        if removed > 0 {
            tracing::debug!(count = removed, "Purged expired OAuth entries");
        }
        removed
    }

    /// Start background cleanup task for expired codes and tokens.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let period = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.purge_expired().await;
            }
        });
    }

    /// Current record counts.
    pub async fn stats(&self) -> AuthorityStats {
        let clients = self.clients.len().await;
        let grants = self.grants.read().await;
        AuthorityStats {
            clients,
            authorization_codes: grants.codes.len(),
            access_tokens: grants.access_tokens.len(),
            refresh_tokens: grants.refresh_tokens.len(),
            revoked_tokens: grants.revoked.len(),
        }
    }
}

impl Default for AuthorizationServer {
    fn default() -> Self {
        Self::new(AuthorityConfig::default())
    }
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer").field("config", &self.config).finish()
    }
}
