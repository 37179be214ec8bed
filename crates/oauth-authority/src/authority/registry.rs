//! Dynamic client registration (RFC 7591).
//!
//! Registration mints long-lived credentials, so it carries its own
//! resource-exhaustion guards: a ceiling on live clients and a token-bucket
//! rate limit on new registrations. Clients are never evicted.

use std::collections::HashMap;

use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::RwLock;

use super::secrets::{constant_time_eq, generate_client_id, generate_client_secret};
use super::types::{Client, ClientMetadata, deadline};
use crate::config::AuthorityConfig;
use crate::error::{OAuthError, OAuthResult};

/// Registered clients plus the guards on registering more.
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Client>>,
    limiter: DefaultDirectRateLimiter,
    max_clients: usize,
    secret_ttl: std::time::Duration,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(config: &AuthorityConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            limiter: RateLimiter::direct(Quota::per_minute(config.registrations_per_minute)),
            max_clients: config.max_clients,
            secret_ttl: config.client_secret_ttl,
        }
    }

    /// Register a new client, allocating its id and secret.
    ///
    /// Metadata is validated before either limit is consulted, so rejected
    /// input never spends registration quota.
    pub async fn register(&self, metadata: ClientMetadata) -> OAuthResult<Client> {
        validate_metadata(&metadata)?;

        let mut clients = self.clients.write().await;

        if clients.len() >= self.max_clients {
            tracing::warn!(max_clients = self.max_clients, "Client registration rejected: cap reached");
            return Err(OAuthError::ClientCapExceeded);
        }
        if self.limiter.check().is_err() {
            tracing::warn!("Client registration rejected: rate limit");
            return Err(OAuthError::RateLimitExceeded);
        }

        let mut client_id = generate_client_id();
        while clients.contains_key(&client_id) {
            client_id = generate_client_id();
        }

        let now = Utc::now();
        let client = Client {
            client_id: client_id.clone(),
            client_secret: generate_client_secret(),
            client_name: metadata.client_name,
            redirect_uris: metadata.redirect_uris,
            scope: metadata.scope,
            issued_at: now.timestamp(),
            secret_expires_at: deadline(now, self.secret_ttl).timestamp(),
        };

        clients.insert(client_id, client.clone());
        tracing::info!(client_id = %client.client_id, total = clients.len(), "Registered OAuth client");

        Ok(client)
    }

    /// Look up a client by id.
    pub async fn get(&self, client_id: &str) -> Option<Client> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Authenticate a client by id and secret.
    ///
    /// Unknown client, missing secret, wrong secret and expired secret all
    /// fail identically.
    pub async fn authenticate(&self, client_id: &str, client_secret: Option<&str>) -> OAuthResult<Client> {
        let client = self.get(client_id).await.ok_or(OAuthError::InvalidClient)?;
        let Some(secret) = client_secret else {
            return Err(OAuthError::InvalidClient);
        };
        if !constant_time_eq(secret, &client.client_secret) {
            tracing::debug!(client_id = %client_id, "Client secret mismatch");
            return Err(OAuthError::InvalidClient);
        }
        if client.secret_expired(Utc::now()) {
            tracing::debug!(client_id = %client_id, "Client secret expired");
            return Err(OAuthError::InvalidClient);
        }
        Ok(client)
    }

    /// Number of registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry").field("max_clients", &self.max_clients).finish()
    }
}

fn validate_metadata(metadata: &ClientMetadata) -> OAuthResult<()> {
    if metadata.redirect_uris.is_empty() {
        return Err(OAuthError::invalid_metadata("redirect_uris is required"));
    }
    for uri in &metadata.redirect_uris {
        let parsed = url::Url::parse(uri)
            .map_err(|_| OAuthError::invalid_metadata(format!("redirect_uri is not an absolute URL: {uri}")))?;
        if parsed.fragment().is_some() {
            return Err(OAuthError::invalid_metadata("redirect_uri must not contain a fragment"));
        }
    }
    Ok(())
}
