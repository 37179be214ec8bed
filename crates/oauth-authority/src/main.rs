//! OAuth Authority - Entry Point

use std::num::NonZeroU32;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oauth_authority::config::{AuthorityConfig, Config, limits};
use oauth_authority::server::AuthServer;

#[derive(Parser, Debug)]
#[command(name = "oauth-authority")]
#[command(about = "Embedded OAuth 2.1 authorization server for MCP tool clients")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL used as issuer (e.g., https://auth.example.com)
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Maximum number of registered clients
    #[arg(long, default_value_t = limits::MAX_CLIENTS, env = "OAUTH_MAX_CLIENTS")]
    max_clients: usize,

    /// Client registrations allowed per minute
    #[arg(long, default_value_t = limits::REGISTRATIONS_PER_MINUTE, env = "OAUTH_REGISTRATIONS_PER_MINUTE")]
    registrations_per_minute: NonZeroU32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        max_clients = cli.max_clients,
        registrations_per_minute = cli.registrations_per_minute.get(),
        "Starting OAuth authority"
    );

    let authority = AuthorityConfig::new(cli.max_clients, cli.registrations_per_minute);
    let config = Config::new(authority, cli.port, cli.base_url);

    AuthServer::new(config).run_http().await
}
