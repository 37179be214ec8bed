//! HTTP server for the authorization endpoints.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::authority::AuthorizationServer;
use crate::config::Config;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub authority: Arc<AuthorizationServer>,
    /// Issuer and base for metadata documents.
    pub base_url: String,
}

/// Create the HTTP router over an existing authorization server.
pub fn create_router(authority: Arc<AuthorizationServer>, base_url: String) -> Router {
    let state = Arc::new(HttpState { authority, base_url });

    let protected = Router::new()
        .route("/token/info", get(handlers::handle_token_info))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), handlers::require_bearer));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/.well-known/oauth-protected-resource", get(handlers::handle_protected_resource))
        .route("/.well-known/oauth-authorization-server", get(handlers::handle_auth_server_metadata))
        .route("/register", post(handlers::handle_register))
        .route("/authorize", get(handlers::handle_authorize_get))
        .route("/token", post(handlers::handle_token))
        .route("/revoke", post(handlers::handle_revoke))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Authorization server process: the core plus its HTTP surface.
pub struct AuthServer {
    authority: Arc<AuthorizationServer>,
    config: Config,
}

impl AuthServer {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let authority = Arc::new(AuthorizationServer::new(config.authority.clone()));
        Self { authority, config }
    }

    /// Handle to the authorization core.
    #[must_use]
    pub fn authority(&self) -> Arc<AuthorizationServer> {
        Arc::clone(&self.authority)
    }

    /// Run the HTTP server until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run_http(self) -> anyhow::Result<()> {
        Arc::clone(&self.authority).start_cleanup_task();

        let router = create_router(self.authority, self.config.base_url.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        tracing::info!(issuer = %self.config.base_url, "HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for AuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthServer").field("config", &self.config).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
