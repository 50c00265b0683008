//! Boxoffice Daemon
//!
//! Order-management service for the event-ticketing platform.
//!
//! # Usage
//!
//! ```bash
//! # Start daemon with default configuration
//! boxofficed
//!
//! # Database migrations (requires --features postgres)
//! boxofficed db migrate
//! boxofficed db status
//!
//! # Start with custom environment
//! BOXOFFICE_ENV=test BOXOFFICE_API_PORT=8081 boxofficed
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string (memory store when unset)
//! - `BOXOFFICE_ENV`: Environment (test, development, production)
//! - `BOXOFFICE_API_HOST`: API host (default: 0.0.0.0)
//! - `BOXOFFICE_API_PORT`: API port (default: 8080)
//! - `BOXOFFICE_CATALOG_URL` / `BOXOFFICE_SEATING_URL` /
//!   `BOXOFFICE_PAYMENT_URL` / `BOXOFFICE_NOTIFICATION_URL`:
//!   upstream base URLs (stubs when not all set; required in production)
//! - `BOXOFFICE_CLIENT_TIMEOUT_SECS`: per-request client timeout (default: 30)
//! - `BOXOFFICE_RESERVATION_TTL_SECS`: seat hold TTL (default: 900)
//! - `BOXOFFICE_TAX_RATE`: tax rate on seat subtotals (default: 0.05)
//! - `BOXOFFICE_OUTBOX_INTERVAL_SECS`: dispatcher interval (default: 60)

#[cfg(feature = "postgres")]
mod db;

use boxofficed::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("boxofficed=info".parse()?))
        .init();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    // Check for db subcommand
    #[cfg(feature = "postgres")]
    if args.len() > 1 && args[1] == "db" {
        use db::run_db_command;
        return run_db_command(args).await;
    }

    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Boxoffice Daemon"
    );

    // Prefer PostgreSQL when configured, fall back to the memory store.
    #[cfg(feature = "postgres")]
    if let Some(database_url) = config.database_url.clone() {
        info!("PostgreSQL configured, connecting");
        let pool = sqlx::PgPool::connect(&database_url).await?;
        let daemon = Daemon::new_postgres(config, pool)?;
        daemon.run().await?;
        return Ok(());
    }

    let daemon = Daemon::new_memory(config)?;
    daemon.run().await?;

    Ok(())
}
