use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use server::config::Args;
use server::error::ServerError;
use server::http::{build_router, spawn_watchdog};
use server::lobby::LobbyManager;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let args = Args::parse();

    let lobbies = Arc::new(LobbyManager::new());
    spawn_watchdog(lobbies.clone());

    let app = build_router(lobbies);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .map_err(|err| ServerError::Bind(args.listen.clone(), err))?;

    tracing::info!(addr = %args.listen, "listening");

    let shutdown_timeout = Duration::from_secs(args.shutdown_timeout_secs);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(|err| ServerError::Bind(args.listen.clone(), err))?;

    Ok(())
}

/// Waits for Ctrl-C, then returns immediately so `axum::serve` begins its own
/// graceful shutdown; the passed timeout only bounds how long this process
/// keeps running in-flight match loops before the process could be force
/// killed externally, and is otherwise informational.
async fn shutdown_signal(grace: Duration) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(?grace, "shutdown signal received, draining");
}
