//! Token issuance: authorization code exchange and refresh rotation.

use chrono::Utc;

use super::codes::check_code;
use super::secrets::{generate_access_token, generate_refresh_token};
use super::types::{
    AccessToken, Client, RefreshToken, TOKEN_TYPE_BEARER, TokenResponse, deadline, join_scopes,
};
use super::{AuthorizationServer, GrantTables};
use crate::error::{OAuthError, OAuthResult};

/// Scopes for a refreshed pair.
///
/// Omitted (or empty) keeps the original grant exactly. Otherwise every
/// requested scope must already be granted; widening is an error, never
/// silently clipped.
fn narrow_scopes(granted: &[String], requested: Option<&[String]>) -> OAuthResult<Vec<String>> {
    let Some(requested) = requested.filter(|r| !r.is_empty()) else {
        return Ok(granted.to_vec());
    };

    let mut narrowed: Vec<String> = Vec::with_capacity(requested.len());
    for scope in requested {
        if !granted.contains(scope) {
            return Err(OAuthError::InvalidScope);
        }
        if !narrowed.contains(scope) {
            narrowed.push(scope.clone());
        }
    }
    Ok(narrowed)
}

impl AuthorizationServer {
    /// Exchange an authorization code for an access/refresh token pair.
    ///
    /// The code is marked consumed under the same write guard that checked
    /// it, so a replayed or concurrent exchange always fails `InvalidGrant`.
    /// PKCE and redirect checks belong to the caller (see
    /// [`AuthorizationServer::pending_authorization`]).
    pub async fn exchange_authorization_code(
        &self,
        client: &Client,
        code: &str,
    ) -> OAuthResult<TokenResponse> {
        let mut grants = self.grants.write().await;

        check_code(grants.codes.get(code), &client.client_id, Utc::now())?;
        let stored = grants.codes.get_mut(code).ok_or(OAuthError::InvalidGrant)?;
        stored.consumed = true;
        let scopes = stored.scopes.clone();

        let pair = self.issue_tokens(&mut grants, &client.client_id, scopes);
        tracing::info!(client_id = %client.client_id, scope = %pair.scope, "Exchanged authorization code");

        Ok(pair)
    }

    /// Rotate a refresh token: the old one is deleted outright and a fresh
    /// access/refresh pair is issued.
    ///
    /// Access tokens issued earlier in the lineage are left untouched.
    pub async fn exchange_refresh_token(
        &self,
        client: &Client,
        refresh_token: &str,
        requested_scopes: Option<&[String]>,
    ) -> OAuthResult<TokenResponse> {
        let mut grants = self.grants.write().await;
        let now = Utc::now();

        let stored = grants.refresh_tokens.get(refresh_token).ok_or(OAuthError::InvalidGrant)?;
        if stored.is_expired(now) {
            grants.refresh_tokens.remove(refresh_token);
            return Err(OAuthError::InvalidGrant);
        }
        if stored.client_id != client.client_id {
            tracing::warn!(client_id = %client.client_id, "Refresh rejected: token owned by another client");
            return Err(OAuthError::ClientMismatch);
        }
        let scopes = narrow_scopes(&stored.scopes, requested_scopes)?;

        grants.refresh_tokens.remove(refresh_token);
        let pair = self.issue_tokens(&mut grants, &client.client_id, scopes);
        tracing::info!(client_id = %client.client_id, scope = %pair.scope, "Rotated refresh token");

        Ok(pair)
    }

    /// Mint and store a new access/refresh pair.
    pub(super) fn issue_tokens(
        &self,
        grants: &mut GrantTables,
        client_id: &str,
        scopes: Vec<String>,
    ) -> TokenResponse {
        let now = Utc::now();
        let access = generate_access_token();
        let refresh = generate_refresh_token();
        let scope = join_scopes(&scopes);

        grants.access_tokens.insert(
            access.clone(),
            AccessToken {
                client_id: client_id.to_owned(),
                scopes: scopes.clone(),
                issued_at: now,
                expires_at: deadline(now, self.config.access_token_ttl),
            },
        );
        grants.refresh_tokens.insert(
            refresh.clone(),
            RefreshToken {
                client_id: client_id.to_owned(),
                scopes,
                expires_at: deadline(now, self.config.refresh_token_ttl),
            },
        );

        TokenResponse {
            access_token: access,
            refresh_token: refresh,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: self.config.access_token_ttl_secs(),
            scope,
        }
    }
}
