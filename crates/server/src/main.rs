mod bootstrap;
mod health;
mod sessions;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use grantbot_core::config::{AppConfig, LoadOptions};
use grantbot_core::registry::SessionRegistry;
use tower_http::trace::TraceLayer;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) {
    use grantbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

/// Periodically drops sessions nobody has written to within `idle_for`.
async fn evict_idle_sessions(registry: Arc<SessionRegistry>, idle_for: Duration) {
    let Ok(window) = chrono::Duration::from_std(idle_for) else {
        return;
    };
    let mut ticks = tokio::time::interval(idle_for.min(SWEEP_INTERVAL));
    ticks.tick().await;
    loop {
        ticks.tick().await;
        let registry = registry.clone();
        let swept =
            tokio::task::spawn_blocking(move || registry.evict_idle(window, chrono::Utc::now())).await;
        if let Err(error) = swept {
            tracing::warn!(
                event_name = "session.eviction_failed",
                correlation_id = "sweeper",
                error = %error,
                "idle session sweep failed"
            );
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

    let app = bootstrap::bootstrap_with_config(config)?;
    let router = Router::new()
        .merge(health::router(app.registry.clone()))
        .merge(sessions::router(app.registry.clone()))
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "grantbot-server listening"
    );

    let sweeper = tokio::spawn(evict_idle_sessions(
        app.registry.clone(),
        Duration::from_secs(app.config.server.session_idle_secs),
    ));

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            sweeper.abort();
            joined??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_sessions = app.registry.len(),
        "grantbot-server stopping"
    );
    let _ = stop_tx.send(true);
    sweeper.abort();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = app.config.server.graceful_shutdown_secs,
                "in-flight requests did not finish in time"
            );
            server.abort();
        }
    }

    Ok(())
}
