use std::sync::Arc;

use delivery_core::api;
use delivery_core::config::Config;
use delivery_core::error::AppError;
use delivery_core::notify::dispatcher::run_notification_dispatcher;
use delivery_core::observability::init_tracing;
use delivery_core::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let http_port = config.http_port;
    let (app_state, outbox_rx) = AppState::new(config);
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_notification_dispatcher(
        shared_state.notifier.clone(),
        outbox_rx,
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port,
        selection_policy = shared_state.selection.name(),
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
