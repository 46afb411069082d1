//! World server binary for Tessera.
//!
//! Wires the core together around a single tick thread and runs until
//! Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$TESSERA_CONFIG` (default
//!    `tessera-config.yaml`); a missing file means defaults
//! 2. Initialize structured logging (tracing), `RUST_LOG` overriding the
//!    configured level
//! 3. Start the notification bridge
//! 4. Build the world server and start the metronome
//! 5. Wait for Ctrl-C, then stop the metronome and drain the bridge

mod bridge;
mod error;

use std::sync::Arc;
use std::time::Duration;

use tessera_core::{ChannelSink, LocalFileService, NotificationSink, ServerConfig, WorldServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "TESSERA_CONFIG";

/// Configuration file used when the environment does not name one.
const DEFAULT_CONFIG_PATH: &str = "tessera-config.yaml";

/// How long to wait for the bridge to flush after shutdown.
const BRIDGE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Application entry point for the world server.
///
/// # Errors
///
/// Returns an error if configuration, world construction, or the tick
/// loop fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        config = config_path,
        world_name = config.world.name,
        fast_interval_ms = config.ticks.fast_interval_ms,
        normal_interval_ms = config.ticks.normal_interval_ms,
        slow_interval_ms = config.ticks.slow_interval_ms,
        hot_radius = config.composer.hot_radius,
        warm_radius = config.composer.warm_radius(),
        "tessera-server starting"
    );

    // 3. Notification bridge.
    let (sink, rx) = ChannelSink::channel();
    let sink: Arc<dyn NotificationSink> = Arc::new(sink);
    let bridge = tokio::spawn(bridge::run(rx));

    // 4. World server.
    let mut server = WorldServer::new(config, sink).map_err(ServerError::from)?;
    server.start().map_err(ServerError::from)?;

    // 5. Run until interrupted.
    tokio::signal::ctrl_c().await.map_err(ServerError::from)?;
    info!("Shutdown requested");

    let stopped = server.stop();
    // Dropping the server drops the last notification sender.
    drop(server);

    match tokio::time::timeout(BRIDGE_DRAIN_TIMEOUT, bridge).await {
        Ok(Ok(stats)) => info!(
            tile_changes = stats.tile_changes,
            view_changes = stats.view_changes,
            "Notification bridge drained"
        ),
        Ok(Err(err)) => warn!(error = %err, "Notification bridge task failed"),
        Err(_elapsed) => warn!("Notification bridge did not drain in time"),
    }

    stopped.map_err(ServerError::from)?;
    info!("tessera-server stopped");
    Ok(())
}

/// Load configuration from `path`, falling back to defaults if the file
/// does not exist.
fn load_config(path: &str) -> Result<ServerConfig, ServerError> {
    Ok(ServerConfig::load(&LocalFileService, path)?)
}
