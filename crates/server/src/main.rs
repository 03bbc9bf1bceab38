mod bootstrap;
mod commands;
mod dispatch;
mod followup;
mod health;
mod install;
mod jobs;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use pumi_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use pumi_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when present.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = TcpListener::bind(&address).await?;

    let schedules = jobs::spawn_scheduler(app.state.clone(), &app.config.jobs);
    let router =
        routes::router(app.state.clone()).merge(health::router(app.db_pool.clone()));

    tracing::info!(
        event_name = "system.server.started",
        address = %address,
        scheduled_jobs = schedules.len(),
        "pumi-server listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = stop_rx.await;
    });
    let mut server_task = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server_task => {
            // The listener died before any shutdown signal.
            joined??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(event_name = "system.server.stopping", "shutdown signal received");
    for handle in &schedules {
        handle.abort();
    }
    let _ = stop_tx.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, &mut server_task).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                grace_secs = app.config.server.graceful_shutdown_secs,
                "in-flight requests did not finish in time"
            );
            server_task.abort();
        }
    }

    app.db_pool.close().await;
    tracing::info!(event_name = "system.server.stopped", "pumi-server stopped");
    Ok(())
}
