//! Notification bridge.
//!
//! Stands in for the network layer: drains the core's notification
//! channel and logs each notification as JSON. A real front end would
//! fan these out to connected observers instead.

use tessera_types::Notification;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// Counts of what the bridge forwarded before its channel closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// `TileStateChanged` notifications.
    pub tile_changes: u64,
    /// `ActorViewChanged` notifications.
    pub view_changes: u64,
}

/// Forward notifications until every sender is gone.
pub async fn run(mut rx: UnboundedReceiver<Notification>) -> BridgeStats {
    let mut stats = BridgeStats::default();
    while let Some(note) = rx.recv().await {
        match &note {
            Notification::TileStateChanged(_) => {
                stats.tile_changes = stats.tile_changes.saturating_add(1);
            }
            Notification::ActorViewChanged(_) => {
                stats.view_changes = stats.view_changes.saturating_add(1);
            }
        }
        match serde_json::to_string(&note) {
            Ok(json) => debug!(target: "tessera::bridge", %json, "Notification"),
            Err(err) => warn!(error = %err, "Failed to encode notification"),
        }
    }
    stats
}
