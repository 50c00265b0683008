//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Upstream service base URLs and timeout
    pub services: ServicesConfig,

    /// Saga tunables
    pub orders: OrdersConfig,

    /// Outbox dispatcher configuration
    pub outbox: OutboxConfig,

    /// PostgreSQL connection string (memory store when absent)
    pub database_url: Option<String>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Upstream service configuration.
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Catalog service base URL
    pub catalog_url: Option<String>,
    /// Seating service base URL
    pub seating_url: Option<String>,
    /// Payment service base URL
    pub payment_url: Option<String>,
    /// Notification service base URL
    pub notification_url: Option<String>,
    /// Per-request timeout for every client
    pub client_timeout: Duration,
}

impl ServicesConfig {
    /// Whether all four base URLs are configured (HTTP client wiring).
    pub fn fully_configured(&self) -> bool {
        self.catalog_url.is_some()
            && self.seating_url.is_some()
            && self.payment_url.is_some()
            && self.notification_url.is_some()
    }
}

/// Saga tunables.
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// Tax rate applied to the seat subtotal
    pub tax_rate: Decimal,
    /// Seat hold TTL passed to the seating service
    pub reservation_ttl_seconds: u64,
}

/// Outbox dispatcher configuration.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Interval between dispatcher ticks
    pub dispatch_interval: Duration,
    /// Max rows fetched per tick
    pub batch_limit: u32,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (stubs, memory store)
    Test,
    /// Development environment
    Development,
    /// Production environment (requires service URLs)
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let services = Self::load_services_config(environment)?;
        let orders = Self::load_orders_config()?;
        let outbox = Self::load_outbox_config()?;
        let database_url = env::var("DATABASE_URL").ok();

        Ok(Self {
            api,
            services,
            orders,
            outbox,
            database_url,
            environment,
        })
    }

    /// Create test configuration: port 0, stubs, memory store.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            services: ServicesConfig {
                catalog_url: None,
                seating_url: None,
                payment_url: None,
                notification_url: None,
                client_timeout: Duration::from_secs(30),
            },
            orders: OrdersConfig {
                tax_rate: Decimal::new(5, 2), // 0.05
                reservation_ttl_seconds: 900,
            },
            outbox: OutboxConfig {
                dispatch_interval: Duration::from_millis(50),
                batch_limit: 500,
            },
            database_url: None,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("BOXOFFICE_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid BOXOFFICE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("BOXOFFICE_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_str = env::var("BOXOFFICE_API_PORT").unwrap_or_else(|_| "8080".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            DaemonError::Config(format!("Invalid BOXOFFICE_API_PORT: {}", port_str))
        })?;

        Ok(ApiConfig { host, port })
    }

    fn load_services_config(environment: Environment) -> DaemonResult<ServicesConfig> {
        let timeout_secs = Self::load_u64_env("BOXOFFICE_CLIENT_TIMEOUT_SECS", 30)?;

        let services = ServicesConfig {
            catalog_url: env::var("BOXOFFICE_CATALOG_URL").ok(),
            seating_url: env::var("BOXOFFICE_SEATING_URL").ok(),
            payment_url: env::var("BOXOFFICE_PAYMENT_URL").ok(),
            notification_url: env::var("BOXOFFICE_NOTIFICATION_URL").ok(),
            client_timeout: Duration::from_secs(timeout_secs),
        };

        // Production never runs on stubs.
        if environment == Environment::Production && !services.fully_configured() {
            return Err(DaemonError::Config(
                "BOXOFFICE_CATALOG_URL, BOXOFFICE_SEATING_URL, BOXOFFICE_PAYMENT_URL, and \
                 BOXOFFICE_NOTIFICATION_URL are required in production"
                    .to_string(),
            ));
        }

        Ok(services)
    }

    fn load_orders_config() -> DaemonResult<OrdersConfig> {
        let tax_rate = Self::load_decimal_env(
            "BOXOFFICE_TAX_RATE",
            Decimal::new(5, 2), // 0.05
        )?;
        let reservation_ttl_seconds =
            Self::load_u64_env("BOXOFFICE_RESERVATION_TTL_SECS", 900)?;

        Ok(OrdersConfig {
            tax_rate,
            reservation_ttl_seconds,
        })
    }

    fn load_outbox_config() -> DaemonResult<OutboxConfig> {
        let interval_secs = Self::load_u64_env("BOXOFFICE_OUTBOX_INTERVAL_SECS", 60)?;
        let batch_limit = Self::load_u64_env("BOXOFFICE_OUTBOX_BATCH_LIMIT", 500)? as u32;

        Ok(OutboxConfig {
            dispatch_interval: Duration::from_secs(interval_secs),
            batch_limit,
        })
    }

    fn load_decimal_env(key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match env::var(key) {
            Ok(val) => Decimal::from_str(&val)
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_u64_env(key: &str, default: u64) -> DaemonResult<u64> {
        match env::var(key) {
            Ok(val) => val
                .parse::<u64>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            services: ServicesConfig {
                catalog_url: None,
                seating_url: None,
                payment_url: None,
                notification_url: None,
                client_timeout: Duration::from_secs(30),
            },
            orders: OrdersConfig {
                tax_rate: Decimal::new(5, 2),
                reservation_ttl_seconds: 900,
            },
            outbox: OutboxConfig {
                dispatch_interval: Duration::from_secs(60),
                batch_limit: 500,
            },
            database_url: None,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.orders.tax_rate, Decimal::new(5, 2));
        assert_eq!(config.orders.reservation_ttl_seconds, 900);
        assert_eq!(config.outbox.dispatch_interval, Duration::from_secs(60));
        assert_eq!(config.services.client_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_services_fully_configured() {
        let mut services = ServicesConfig {
            catalog_url: Some("http://catalog".to_string()),
            seating_url: Some("http://seating".to_string()),
            payment_url: Some("http://payment".to_string()),
            notification_url: None,
            client_timeout: Duration::from_secs(30),
        };
        assert!(!services.fully_configured());

        services.notification_url = Some("http://notify".to_string());
        assert!(services.fully_configured());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
