//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use checkout::{InMemoryPaymentGateway, PaymentGateway, XenditGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn payment_gateway(config: &Config) -> Result<Arc<dyn PaymentGateway>, BoxError> {
    match &config.gateway_secret_key {
        Some(secret_key) => {
            tracing::info!(url = %config.gateway_url, "using Xendit payment gateway");
            let gateway =
                XenditGateway::new(&config.gateway_url, secret_key, config.gateway_timeout)?;
            Ok(Arc::new(gateway))
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_SECRET_KEY not set, using in-memory payment gateway");
            Ok(Arc::new(InMemoryPaymentGateway::new()))
        }
    }
}

async fn serve<S: Store + Clone + 'static>(
    config: &Config,
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state =
        api::create_default_state(store, gateway, &config.jwt_secret, config.gateway_timeout);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.uses_dev_jwt_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Payment gateway
    let gateway = payment_gateway(&config)?;

    // 4. Store, then serve until shutdown
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            serve(&config, store, gateway, metrics_handle).await?;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(&config, InMemoryStore::new(), gateway, metrics_handle).await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
