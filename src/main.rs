use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, Level};

use gridclaim_server::arena::{ArenaConfig, ArenaEngine, GridArena};
use gridclaim_server::bots::BotPopulationController;
use gridclaim_server::config::ServerConfig;
use gridclaim_server::constants::tick::SLOW_TICK_MS;
use gridclaim_server::metrics::{self, Metrics};

/// Headless soak driver: one arena full of bots on the slow tick, with the
/// metrics endpoint exposed. Exercises the same code paths a match does
/// without a transport in front.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Gridclaim matchmaking server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    if let Err(e) = config.validate() {
        anyhow::bail!("invalid configuration: {e}");
    }
    info!(
        bots = config.bot_count,
        metrics_port = config.metrics_port,
        min_players = config.match_config.min_players,
        max_players = config.match_config.max_players,
        "configuration loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let metrics_server = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_server, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let mut arena = GridArena::new(ArenaConfig::default());
    let mut bots = BotPopulationController::new();
    bots.set_target_count(&mut arena, config.bot_count);

    let mut ticker = tokio::time::interval(Duration::from_millis(SLOW_TICK_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let soak = async {
        let mut last_report = Instant::now();
        loop {
            ticker.tick().await;
            let started = Instant::now();

            arena.step();
            bots.loop_tick(&mut arena);

            metrics.record_tick_time(started.elapsed());
            metrics
                .bot_players
                .store(bots.active_count() as u64, Ordering::Relaxed);
            metrics
                .alive_players
                .store(arena.alive_players().len() as u64, Ordering::Relaxed);

            if last_report.elapsed() >= Duration::from_secs(10) {
                info!(
                    bots = bots.active_count(),
                    alive = arena.alive_players().len(),
                    ticks = metrics.tick_count.load(Ordering::Relaxed),
                    "soak status"
                );
                last_report = Instant::now();
            }
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = soak => {}
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Server stopped");
    Ok(())
}
