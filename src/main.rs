use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use zone_dispatch::api;
use zone_dispatch::config::Config;
use zone_dispatch::engine::auto_dispatch::run_auto_dispatch;
use zone_dispatch::error::AppError;
use zone_dispatch::notify::{run_notification_worker, LogSender};
use zone_dispatch::state::AppState;
use zone_dispatch::store::Stores;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let (app_state, queues) = AppState::new(&config, Stores::in_memory(), Arc::new(LogSender));
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_auto_dispatch(shared_state.clone(), queues.order_rx));
    tokio::spawn(run_notification_worker(
        shared_state.notifier.clone(),
        queues.notification_rx,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        commission_rate = %config.policy.commission_rate,
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
