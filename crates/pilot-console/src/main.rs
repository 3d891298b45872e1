use std::sync::Arc;

use pilot_console::{config::ConsoleConfig, state::AppState};
use pilot_process::SystemRunner;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConsoleConfig::from_env()?;
    let runner = Arc::new(SystemRunner::new(config.kill_grace));
    let state = AppState::new(
        Arc::clone(&runner),
        config.vault.clone(),
        config.worktree.clone(),
    );

    let app = pilot_console::app(state.clone());
    let addr = config.addr;
    tracing::info!(
        %addr,
        project_root = %config.worktree.project_root.display(),
        "pilot-console HTTP listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // A running `sx install` is given its own timeout plus the kill grace to
    // wind down before the process exits.
    let drain = config.vault.install_timeout + runner.kill_grace();
    if tokio::time::timeout(drain, state.vault.wait_for_install())
        .await
        .is_err()
    {
        tracing::warn!(timeout_ms = drain.as_millis() as u64, "install still running at exit");
    }

    Ok(())
}
