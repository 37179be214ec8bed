//! OAuth Authority
//!
//! An embedded OAuth 2.1 authorization server that issues, verifies, rotates
//! and revokes short-lived bearer credentials for tool-calling clients acting
//! on behalf of a tenant.
//!
//! # Features
//!
//! - **Dynamic client registration** with a live-client cap and a rate limit
//! - **Authorization code + PKCE** with single-use codes
//! - **Refresh rotation**: every refresh deletes the old token and mints a new pair
//! - **Idempotent revocation** per RFC 7009
//!
//! # Example
//!
//! ```no_run
//! use oauth_authority::{AuthorizationServer, ClientMetadata, config::AuthorityConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = AuthorizationServer::new(AuthorityConfig::default());
//!     let client = server
//!         .register_client(ClientMetadata::new("CRM connector", vec!["https://app.example.com/cb".into()]))
//!         .await?;
//!
//!     // Hand `client.client_id` and `client.client_secret` to the integration.
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod config;
pub mod error;
pub mod server;

pub use authority::{AuthInfo, AuthorizationServer, Client, ClientMetadata, TokenVerifier};
pub use config::Config;
pub use error::OAuthError;
