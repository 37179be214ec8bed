//! Bearer token verification and revocation (RFC 7009).

use async_trait::async_trait;
use chrono::Utc;

use super::AuthorizationServer;
use super::types::{AuthInfo, Client, RevocationRequest};
use crate::error::{OAuthError, OAuthResult};

/// Validates bearer tokens presented by resource calls.
///
/// Tool-call handlers depend on this trait rather than on the concrete
/// server, so a shared-store implementation can slot in later.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> OAuthResult<AuthInfo>;
}

#[async_trait]
impl TokenVerifier for AuthorizationServer {
    async fn verify(&self, token: &str) -> OAuthResult<AuthInfo> {
        self.verify_access_token(token).await
    }
}

impl AuthorizationServer {
    /// Verify an access token and return its grant.
    pub async fn verify_access_token(&self, token: &str) -> OAuthResult<AuthInfo> {
        let grants = self.grants.read().await;

        if grants.revoked.contains_key(token) {
            return Err(OAuthError::TokenRevoked);
        }
        let stored = grants.access_tokens.get(token).ok_or(OAuthError::InvalidToken)?;
        if stored.is_expired(Utc::now()) {
            return Err(OAuthError::TokenExpired);
        }

        Ok(AuthInfo {
            token: token.to_owned(),
            client_id: stored.client_id.clone(),
            scopes: stored.scopes.clone(),
            expires_at: stored.expires_at.timestamp(),
        })
    }

    /// Revoke an access or refresh token. Always succeeds.
    ///
    /// An access token moves to the revocation set. A refresh token is
    /// deleted, so it later fails exactly like one that never existed.
    /// Unknown tokens, and tokens owned by a different client, are left
    /// alone. Sibling tokens in the same lineage are never touched.
    pub async fn revoke_token(&self, client: &Client, request: &RevocationRequest) {
        let token = request.token.as_str();
        let mut grants = self.grants.write().await;

        if let Some(access) = grants.access_tokens.get(token) {
            if access.client_id != client.client_id {
                tracing::warn!(client_id = %client.client_id, "Ignored revocation of another client's access token");
                return;
            }
            let expires_at = access.expires_at;
            grants.access_tokens.remove(token);
            grants.revoked.insert(token.to_owned(), expires_at);
            tracing::info!(client_id = %client.client_id, "Revoked access token");
            return;
        }

        if let Some(refresh) = grants.refresh_tokens.get(token) {
            if refresh.client_id != client.client_id {
                tracing::warn!(client_id = %client.client_id, "Ignored revocation of another client's refresh token");
                return;
            }
            grants.refresh_tokens.remove(token);
            tracing::info!(client_id = %client.client_id, "Revoked refresh token");
            return;
        }

        tracing::debug!(client_id = %client.client_id, "Revocation of unrecognized token ignored");
    }
}
