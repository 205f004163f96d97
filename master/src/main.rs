use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dispatch_core::adapters::sqlite::connection::create_pool;
use dispatch_core::adapters::sqlite::{Migrator, SqliteStore};
use dispatch_master::config::{self, Cli};
use dispatch_master::state::AppState;
use dispatch_master::{controller, http, logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli).context("failed to load master configuration")?;

    let _log_guard = logging::init(&config.log_level, config.log_format, config.log_dir.as_deref());

    info!(bind = %config.bind_addr(), database_url = %config.database_url, "starting dispatch master");

    let pool = create_pool(&config.database_url, None).await.context("failed to open database pool")?;
    Migrator::new(pool.clone()).run().await.context("failed to run database migrations")?;

    let store = Arc::new(SqliteStore::new(pool));
    let state = AppState::new(store, config.clone());

    let shutdown_tx = controller::spawn(state.clone());

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await.context("failed to bind listener")?;

    info!("master listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("master HTTP server failed")?;

    let _ = shutdown_tx.send(());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
