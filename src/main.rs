//! Countdown Board - shared countdown timers for control and projection surfaces
//!
//! `serve` hosts the store, drives the tick, and exposes the HTTP surfaces.
//! `project` follows a store read-only and prints the audience view.

use std::{io, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use countdown_board::{
    config::{Command, Config, ServeArgs},
    state::{AppState, TimerStore},
    api::create_router,
    tasks::{projection_feed_task, SyncDrivers},
    utils::shutdown_signal,
    views::ProjectionView,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_board={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-board v{}", env!("CARGO_PKG_VERSION"));

    let persistence = config.persistence();
    info!(
        "Configuration: storage={}, finish_policy={:?}, poll={}ms",
        persistence.name(),
        config.finish_policy,
        config.poll_interval().as_millis()
    );

    let store = Arc::new(TimerStore::new(persistence, config.store_config()));
    if let Err(e) = store.refresh().await {
        warn!("Initial load failed, starting with an empty board: {}", e);
    }
    info!("Loaded {} timers", store.list_all().len());

    match &config.command {
        Command::Serve(args) => serve(store, args, config.poll_interval()).await,
        Command::Project(_) => project(store, config.poll_interval()).await,
    }
}

async fn serve(store: Arc<TimerStore>, args: &ServeArgs, poll: Duration) -> anyhow::Result<()> {
    let mut drivers = SyncDrivers::new();
    drivers.start(Arc::clone(&store), poll).await;

    let state = Arc::new(AppState::new(store, args.port, args.host.clone()));
    let app = create_router(state);

    let addr = args.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers              - Create a timer");
    info!("  GET    /timers              - List timers");
    info!("  GET    /timers/events       - Snapshot stream (SSE)");
    info!("  POST   /timers/:id/start    - Start a timer");
    info!("  POST   /timers/:id/pause    - Pause a timer");
    info!("  POST   /timers/:id/reset    - Reset a timer");
    info!("  PUT    /timers/:id/duration - Change total duration");
    info!("  PUT    /timers/:id/name     - Rename a timer");
    info!("  DELETE /timers/:id          - Remove a timer");
    info!("  GET    /projection          - Audience view");
    info!("  GET    /control             - Operator view");
    info!("  *      /records             - Record storage for remote instances");
    info!("  GET    /status              - Store status");
    info!("  GET    /health              - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    drivers.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn project(store: Arc<TimerStore>, poll: Duration) -> anyhow::Result<()> {
    // Read-only: the host instance drives the countdown
    let mut drivers = SyncDrivers::new();
    drivers.start_refresh(Arc::clone(&store), poll).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let view = ProjectionView::new(store.subscribe());
    let feed = tokio::spawn(projection_feed_task(view, io::stdout(), shutdown_rx));

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(e) = feed.await {
        warn!("Projection feed ended abnormally: {}", e);
    }
    drivers.shutdown().await;
    info!("Projection stopped");
    Ok(())
}
