//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Orchestrator (the order saga)
//! - Store (memory or PostgreSQL)
//! - Outbound clients (HTTP or stubs)
//! - Outbox Dispatcher (background worker)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Wire store, clients, metrics, orchestrator
//! 3. Start the outbox dispatcher
//! 4. Start the API server
//! 5. Graceful shutdown on SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use prometheus::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use boxoffice_clients::{
    CatalogPort, HttpCatalogClient, HttpNotificationClient, HttpPaymentClient,
    HttpSeatingClient, NotificationPort, PaymentPort, SeatingPort, StubCatalog,
    StubNotification, StubPayment, StubSeating,
};
use boxoffice_orchestrator::{Orchestrator, OrchestratorConfig, OrderMetrics};
use boxoffice_store::{MemoryStore, OrderStore};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};
use crate::outbox_worker::OutboxDispatcher;

// =============================================================================
// Daemon
// =============================================================================

/// The main boxoffice daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// The saga engine
    orchestrator: Arc<Orchestrator>,
    /// Store shared by the API, orchestrator, and dispatcher
    store: Arc<dyn OrderStore>,
    /// Notification fan-out used by the dispatcher
    notification: Arc<dyn NotificationPort>,
    /// Metrics registry rendered at /metrics
    registry: Registry,
}

/// The four outbound ports as trait objects.
pub type Clients = (
    Arc<dyn CatalogPort>,
    Arc<dyn SeatingPort>,
    Arc<dyn PaymentPort>,
    Arc<dyn NotificationPort>,
);

impl Daemon {
    /// Create a daemon with stub clients and the in-memory store
    /// (tests and local development).
    pub fn new_stub(config: Config) -> DaemonResult<Self> {
        let store: Arc<dyn OrderStore> = Arc::new(MemoryStore::new());
        let clients: Clients = (
            Arc::new(StubCatalog::new()),
            Arc::new(StubSeating::new()),
            Arc::new(StubPayment::new()),
            Arc::new(StubNotification::new()),
        );

        Self::assemble(config, store, clients)
    }

    /// Create a daemon with the in-memory store and clients wired from
    /// configuration (HTTP when all URLs are present, stubs otherwise).
    pub fn new_memory(config: Config) -> DaemonResult<Self> {
        let store: Arc<dyn OrderStore> = Arc::new(MemoryStore::new());
        let clients = Self::build_clients(&config)?;
        Self::assemble(config, store, clients)
    }

    /// Create a daemon over a PostgreSQL pool.
    #[cfg(feature = "postgres")]
    pub fn new_postgres(config: Config, pool: sqlx::PgPool) -> DaemonResult<Self> {
        let store: Arc<dyn OrderStore> = Arc::new(boxoffice_store::PgStore::new(pool));
        let clients = Self::build_clients(&config)?;
        Self::assemble(config, store, clients)
    }

    /// Create a daemon from explicitly provided components.
    pub fn new(
        config: Config,
        store: Arc<dyn OrderStore>,
        clients: Clients,
    ) -> DaemonResult<Self> {
        Self::assemble(config, store, clients)
    }

    fn build_clients(config: &Config) -> DaemonResult<Clients> {
        let services = &config.services;

        if let (Some(catalog_url), Some(seating_url), Some(payment_url), Some(notification_url)) = (
            &services.catalog_url,
            &services.seating_url,
            &services.payment_url,
            &services.notification_url,
        ) {
            let timeout = services.client_timeout;
            info!(
                catalog = %catalog_url,
                seating = %seating_url,
                payment = %payment_url,
                notification = %notification_url,
                "Using HTTP clients"
            );

            Ok((
                Arc::new(HttpCatalogClient::new(catalog_url.clone(), timeout)?),
                Arc::new(HttpSeatingClient::new(seating_url.clone(), timeout)?),
                Arc::new(HttpPaymentClient::new(payment_url.clone(), timeout)?),
                Arc::new(HttpNotificationClient::new(notification_url.clone(), timeout)?),
            ))
        } else {
            info!("Service URLs not fully configured, using stub clients");
            Ok((
                Arc::new(StubCatalog::new()),
                Arc::new(StubSeating::new()),
                Arc::new(StubPayment::new()),
                Arc::new(StubNotification::new()),
            ))
        }
    }

    fn assemble(
        config: Config,
        store: Arc<dyn OrderStore>,
        clients: Clients,
    ) -> DaemonResult<Self> {
        let (catalog, seating, payment, notification) = clients;

        let registry = Registry::new();
        let metrics = OrderMetrics::new(&registry)?;

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            catalog,
            seating,
            payment,
            metrics,
            OrchestratorConfig {
                tax_rate: config.orders.tax_rate,
                reservation_ttl_seconds: config.orders.reservation_ttl_seconds,
            },
        ));

        Ok(Self {
            config,
            orchestrator,
            store,
            notification,
            registry,
        })
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting boxoffice daemon"
        );

        let shutdown = CancellationToken::new();

        // 1. Outbox dispatcher.
        let dispatcher = OutboxDispatcher::new(
            self.store.clone(),
            self.notification.clone(),
            self.config.outbox.dispatch_interval,
            self.config.outbox.batch_limit,
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown.child_token()));

        // 2. API server.
        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // 3. Wait for shutdown.
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");

        // 4. Graceful shutdown.
        shutdown.cancel();
        if let Err(e) = dispatcher_handle.await {
            error!(error = %e, "Outbox dispatcher task panicked");
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Start the API server.
    async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            orchestrator: self.orchestrator.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Config(format!("Failed to get local address: {}", e)))?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}
