use anyhow::Context;
use clap::Parser;
use dispatch_agent::agent_core::AgentCore;
use dispatch_agent::config::{self, Cli};
use dispatch_agent::state::AppState;
use dispatch_agent::{http, logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli).context("failed to load agent configuration")?;

    let _log_guard = logging::init(&config.log_level, config.log_format, config.log_dir.as_deref());

    let working_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let mut core = AgentCore::new(&config, working_dir);

    if !cli.no_autoregister {
        let hostname = hostname()?;
        let self_url = config.self_url();
        info!(hostname = %hostname, self_url = %self_url, master_url = %config.master_url, "registering with master");
        core.register_and_fetch_runner(hostname, self_url).await.context("startup registration failed")?;
    }

    let state = AppState::new(core, config.clone());
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await.context("failed to bind listener")?;
    info!("agent listening on {}", config.bind_addr());

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("agent HTTP server failed")?;

    Ok(())
}

fn hostname() -> anyhow::Result<String> {
    let name = nix::unistd::gethostname().context("failed to read hostname")?;
    Ok(name.to_string_lossy().into_owned())
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
