//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// One of the three independently configurable simulation frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TickRate {
    /// Highest frequency. Drives request draining and command queues.
    Fast,
    /// Medium frequency.
    Normal,
    /// Lowest frequency.
    Slow,
}

impl TickRate {
    /// All rates in firing order.
    pub const ALL: [Self; 3] = [Self::Fast, Self::Normal, Self::Slow];
}

impl core::fmt::Display for TickRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::Slow => "slow",
        };
        f.write_str(name)
    }
}

/// Simulation tier of a tile.
///
/// A tile is in exactly one state at a time. The legal edges are
/// Cold <-> Warm and Warm <-> Hot; there is no direct Cold -> Hot edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoadState {
    /// Unloaded, minimal state. Initial and terminal.
    #[default]
    Cold,
    /// Standby: reduced-rate simulation, kept ready for promotion.
    Warm,
    /// Full-rate simulation near a tracked actor.
    Hot,
}
