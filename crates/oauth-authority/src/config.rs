//! Configuration for the OAuth authority.

use std::num::NonZeroU32;
use std::time::Duration;

/// Default limits and lifetimes.
pub mod limits {
    use std::num::NonZeroU32;
    use std::time::Duration;

    /// Maximum number of live registered clients.
    pub const MAX_CLIENTS: usize = 1000;

    /// Client registrations allowed per minute (burst equals the quota).
    pub const REGISTRATIONS_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(10) {
        Some(n) => n,
        None => panic!("registration quota must be non-zero"),
    };

    /// Authorization code lifetime (10 minutes).
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(600);

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Refresh token lifetime (30 days).
    pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

    /// Client secret lifetime (1 year).
    pub const CLIENT_SECRET_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

    /// Interval between expiry purges.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);
}

/// Authorization server configuration.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Ceiling on live registered clients.
    pub max_clients: usize,

    /// Registration quota per minute.
    pub registrations_per_minute: NonZeroU32,

    /// Authorization code lifetime.
    pub auth_code_ttl: Duration,

    /// Access token lifetime, reported to clients as `expires_in`.
    pub access_token_ttl: Duration,

    /// Refresh token lifetime.
    pub refresh_token_ttl: Duration,

    /// Client secret lifetime.
    pub client_secret_ttl: Duration,

    /// Interval between expiry purges.
    pub cleanup_interval: Duration,
}

impl AuthorityConfig {
    /// Create a configuration with custom client limits and default lifetimes.
    #[must_use]
    pub fn new(max_clients: usize, registrations_per_minute: NonZeroU32) -> Self {
        Self { max_clients, registrations_per_minute, ..Self::default() }
    }

    /// Create a test configuration with limits loose enough not to interfere.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_clients: 10_000,
            registrations_per_minute: NonZeroU32::new(10_000).unwrap_or(NonZeroU32::MIN),
            ..Self::default()
        }
    }

    /// Access token lifetime in whole seconds.
    #[must_use]
    pub const fn access_token_ttl_secs(&self) -> u64 {
        self.access_token_ttl.as_secs()
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            max_clients: limits::MAX_CLIENTS,
            registrations_per_minute: limits::REGISTRATIONS_PER_MINUTE,
            auth_code_ttl: limits::AUTH_CODE_TTL,
            access_token_ttl: limits::ACCESS_TOKEN_TTL,
            refresh_token_ttl: limits::REFRESH_TOKEN_TTL,
            client_secret_ttl: limits::CLIENT_SECRET_TTL,
            cleanup_interval: limits::CLEANUP_INTERVAL,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Authorization server limits and lifetimes.
    pub authority: AuthorityConfig,

    /// HTTP listen port.
    pub port: u16,

    /// Public base URL used as issuer and in metadata documents.
    pub base_url: String,
}

impl Config {
    /// Default public base URL when none is configured.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000";

    /// Create a new configuration.
    #[must_use]
    pub fn new(authority: AuthorityConfig, port: u16, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_owned());
        Self { authority, port, base_url }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(AuthorityConfig::default(), 8000, None)
    }
}
