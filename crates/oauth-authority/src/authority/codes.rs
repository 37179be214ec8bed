//! Authorization code issuance and lookup.

use chrono::{DateTime, Utc};

use super::AuthorizationServer;
use super::secrets::generate_auth_code;
use super::types::{
    AuthorizationCode, AuthorizationRedirect, AuthorizeParams, Client, PendingAuthorization,
    deadline,
};
use crate::error::{OAuthError, OAuthResult};

/// Reject a code that cannot be exchanged by `client_id`.
///
/// Unknown, expired and consumed codes are indistinguishable. Ownership is
/// only checked once the code is otherwise live.
pub(super) fn check_code(
    code: Option<&AuthorizationCode>,
    client_id: &str,
    now: DateTime<Utc>,
) -> OAuthResult<()> {
    let Some(code) = code else {
        return Err(OAuthError::InvalidGrant);
    };
    if code.consumed || code.is_expired(now) {
        return Err(OAuthError::InvalidGrant);
    }
    if code.client_id != client_id {
        return Err(OAuthError::ClientMismatch);
    }
    Ok(())
}

impl AuthorizationServer {
    /// Issue a single-use authorization code for an approved request.
    ///
    /// The redirect target must exactly match one of the client's registered
    /// `redirect_uris`. `state` is echoed only when the caller supplied a
    /// non-empty value.
    pub async fn authorize(
        &self,
        client: &Client,
        params: AuthorizeParams,
    ) -> OAuthResult<AuthorizationRedirect> {
        if !client.allows_redirect(&params.redirect_uri) {
            tracing::warn!(client_id = %client.client_id, "Authorization rejected: unregistered redirect_uri");
            return Err(OAuthError::InvalidRedirectUri);
        }
        if params.code_challenge.is_empty() {
            return Err(OAuthError::invalid_request("code_challenge is required"));
        }
        let mut location =
            url::Url::parse(&params.redirect_uri).map_err(|_| OAuthError::InvalidRedirectUri)?;

        let now = Utc::now();
        let code = {
            let mut grants = self.grants.write().await;
            let mut code = generate_auth_code();
            while grants.codes.contains_key(&code) {
                code = generate_auth_code();
            }
            grants.codes.insert(
                code.clone(),
                AuthorizationCode {
                    client_id: client.client_id.clone(),
                    code_challenge: params.code_challenge,
                    redirect_uri: params.redirect_uri,
                    scopes: params.scopes,
                    state: params.state.clone(),
                    expires_at: deadline(now, self.config.auth_code_ttl),
                    consumed: false,
                },
            );
            code
        };

        {
            let mut query = location.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = params.state.as_deref().filter(|s| !s.is_empty()) {
                query.append_pair("state", state);
            }
        }

        tracing::info!(client_id = %client.client_id, "Issued authorization code");

        Ok(AuthorizationRedirect { location: location.into() })
    }

    /// Stored PKCE challenge for a live code owned by `client`.
    pub async fn challenge_for_authorization_code(
        &self,
        client: &Client,
        code: &str,
    ) -> OAuthResult<String> {
        self.pending_authorization(client, code).await.map(|p| p.code_challenge)
    }

    /// What the token endpoint checks before an exchange: the PKCE challenge
    /// and the redirect target the code was issued for.
    pub async fn pending_authorization(
        &self,
        client: &Client,
        code: &str,
    ) -> OAuthResult<PendingAuthorization> {
        let grants = self.grants.read().await;
        let stored = grants.codes.get(code);
        check_code(stored, &client.client_id, Utc::now())?;

        let stored = stored.ok_or(OAuthError::InvalidGrant)?;
        Ok(PendingAuthorization {
            code_challenge: stored.code_challenge.clone(),
            redirect_uri: stored.redirect_uri.clone(),
        })
    }
}
