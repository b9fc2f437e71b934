use std::sync::Arc;

use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use deadline_engine::api;
use deadline_engine::config::Config;
use deadline_engine::engine::clock::SystemClock;
use deadline_engine::error::AppError;
use deadline_engine::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let shared_state = Arc::new(AppState::new(
        Arc::new(SystemClock),
        config.event_buffer_size,
        Duration::from_secs(config.countdown_refresh_secs),
        config.locale,
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        refresh_secs = config.countdown_refresh_secs,
        locale = %config.locale,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
