//! Tank Battle Server - headless authoritative game server
//!
//! Runs the simulation at 60 Hz and broadcasts snapshots until interrupted.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tank_battle_server::config::Config;
use tank_battle_server::game::GameWorld;
use tank_battle_server::server::GameServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    let game = config.game.clone();
    info!(
        difficulty = ?game.profile.difficulty,
        seed = game.seed,
        players = game.player_count,
        width = game.map_width,
        height = game.map_height,
        "Starting Tank Battle Server"
    );

    let world = GameWorld::new(game);
    let (server, handle) = GameServer::new(world, config.snapshot_tps);
    info!(session_id = %handle.session_id(), snapshot_tps = config.snapshot_tps, "Session created");

    let loop_task = tokio::spawn(server.run());

    shutdown_signal().await;
    handle.stop();

    let world = loop_task.await?;
    info!(
        session_id = %handle.session_id(),
        ticks = world.tick_count(),
        level = world.level(),
        "Server shutdown complete"
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
