//! Pesa Bridge service binary.
//!
//! Loads configuration, connects to Postgres, wires the Daraja and partner
//! clients into the payment handlers and runs the HTTP server alongside the
//! outbox worker pool and the recovery sweeper.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use pesa_bridge::adapters::http::app_router;
use pesa_bridge::adapters::jobs::{OutboxWorker, RecoverySweeper};
use pesa_bridge::adapters::mpesa::{MpesaCallbackParser, MpesaClient};
use pesa_bridge::adapters::partner::HttpPartnerClient;
use pesa_bridge::adapters::postgres::{
    PostgresJobOutbox, PostgresPaymentRepository, PostgresProviderTransactionRepository,
    PostgresSettlementRepository,
};
use pesa_bridge::application::{PaymentPorts, PaymentServices, ProviderRegistry};
use pesa_bridge::config::AppConfig;
use pesa_bridge::domain::payment::CallbackUrls;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        partners = config.partners.len(),
        "Starting pesa-bridge"
    );

    // Database
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // External clients
    let mpesa = Arc::new(MpesaClient::new(config.mpesa.clone())?);
    let partners = Arc::new(HttpPartnerClient::new(config.partners.clone())?);
    let callback_urls = CallbackUrls::new(
        config.mpesa.callback_base(),
        config.mpesa.callback_secret.clone(),
    );

    let outbox = Arc::new(PostgresJobOutbox::new(pool.clone()));
    let ports = PaymentPorts {
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        transactions: Arc::new(PostgresProviderTransactionRepository::new(pool.clone())),
        settlements: Arc::new(PostgresSettlementRepository::new(pool.clone())),
        outbox: outbox.clone(),
        providers: ProviderRegistry::new().with(mpesa),
        callback_parser: Arc::new(MpesaCallbackParser::new()),
        ledger: partners.clone(),
        notifier: partners,
        callback_urls,
    };
    let services = PaymentServices::new(ports, &config.worker);

    // Background work
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = OutboxWorker::new(outbox, services.executor.clone(), config.worker.clone());
    let sweeper = RecoverySweeper::new(services.sweep.clone(), config.worker.sweep_interval());
    let worker_task = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { worker.run(shutdown).await }
    });
    let sweeper_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    // HTTP
    let app = app_router(&services, config.server.request_timeout());
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining background workers");
    let _ = shutdown_tx.send(true);
    let grace = config.server.shutdown_grace();
    for task in [worker_task, sweeper_task] {
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Background task panicked"),
            Err(_) => tracing::warn!(
                grace_secs = grace.as_secs(),
                "Background task did not stop within the grace period"
            ),
        }
    }

    pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// JSON logs in production, human-readable otherwise. `RUST_LOG` wins over
/// the configured directive.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
