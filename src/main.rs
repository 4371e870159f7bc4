use anyhow::{Context, Result};
use chrono::Utc;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fridge_monitor::{
    api,
    config::Config,
    db, hardware,
    monitor::{
        check::CheckService, door::DoorListener, fleet, retention::CleanupService,
        MonitorContext,
    },
};

/// Door transitions buffered between the GPIO callbacks and the listener.
const DOOR_EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent, env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    if config.seed_default_fridges
        && fleet::seed_default_fridges(&pool, Utc::now())
            .await
            .context("failed to seed default fridges")?
    {
        info!("Database was empty; default fridges created");
    }

    let hardware = hardware::from_config(&config)?;
    let ctx = MonitorContext::new(pool, hardware);

    // Relays are driven to their stored state and door edges start flowing here
    let (door_tx, door_rx) = mpsc::channel(DOOR_EVENT_BUFFER);
    let attached = ctx
        .attach_fleet(door_tx)
        .await
        .context("failed to attach fridges to hardware")?;
    if attached == 0 {
        warn!("No fridges attached; only the API is useful until fridges are configured");
    }

    tokio::spawn(DoorListener::new(ctx.clone(), door_rx).run());
    tokio::spawn(CheckService::new(ctx.clone(), config.check_interval_secs).run());
    tokio::spawn(
        CleanupService::new(ctx.clone(), config.retention, config.cleanup_hour_utc).run(),
    );

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
