mod api;
mod middleware;
mod scheduler;

use std::{sync::Arc, time::Duration};

use shopdash_db::PgStore;
use shopdash_ingest::{
    DuplicateSuppressor, IngestionQueue, Reconciler, SyncOrchestrator, WebhookVerifier,
};
use shopdash_shopify::ShopifyClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::TenantAuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(shopdash_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shopdash_db::PoolConfig::from_app_config(&config);
    let pool = shopdash_db::connect_pool(&config.database_url, pool_config).await?;
    shopdash_db::run_migrations(&pool).await?;

    let reconciler = Reconciler::new(Arc::new(PgStore::new(pool.clone())));
    let client = ShopifyClient::new(
        config.shopify_request_timeout_secs,
        &config.shopify_user_agent,
        &config.shopify_api_version,
        config.shopify_max_retries,
        config.shopify_retry_backoff_base_secs,
    )?;
    let orchestrator = Arc::new(SyncOrchestrator::new(
        reconciler.clone(),
        Arc::new(client),
        config.shopify_page_size,
    ));
    let queue = IngestionQueue::start(reconciler);

    let mut scheduler =
        scheduler::build_scheduler(Arc::clone(&orchestrator), &config.sync_cron).await?;

    let state = AppState {
        pool: pool.clone(),
        queue: queue.clone(),
        dedupe: DuplicateSuppressor::new(Duration::from_secs(config.dedupe_window_secs)),
        verifier: Arc::new(WebhookVerifier::new(config.shopify_api_secret.clone())),
        orchestrator,
    };
    let auth = TenantAuthState::new(pool, config.api_token_salt.as_deref());
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    tracing::info!(pending = queue.pending(), "draining ingestion queue");
    queue.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
