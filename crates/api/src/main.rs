//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use lock::{InMemoryLockManager, LockManager, RedisLockManager};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, InventoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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

fn init_tracing(config: &Config) {
    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();
}

/// Picks the lock backend, then serves.
async fn with_locks<S>(config: &Config, store: S, metrics_handle: PrometheusHandle)
where
    S: InventoryStore + Clone + 'static,
{
    match &config.redis_url {
        Some(url) => {
            let locks = RedisLockManager::connect(url)
                .await
                .expect("failed to connect to Redis");
            tracing::info!("using Redis lock manager");
            serve(config, store, Arc::new(locks), metrics_handle).await;
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process locks");
            serve(
                config,
                store,
                Arc::new(InMemoryLockManager::new()),
                metrics_handle,
            )
            .await;
        }
    }
}

async fn serve<S, L>(config: &Config, store: S, locks: Arc<L>, metrics_handle: PrometheusHandle)
where
    S: InventoryStore + Clone + 'static,
    L: LockManager + 'static,
{
    let state = api::create_default_state(store, locks, config.lock_ttl);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, lock_ttl_secs = config.lock_ttl.as_secs(), "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store, run migrations and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres store");
            with_locks(&config, store, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            with_locks(&config, InMemoryStore::new(), metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
