//! Notification payloads published by the core for the network bridge.
//!
//! The core never encodes packets. It hands these serializable values to
//! an injected sink, and whatever sits behind the sink decides which
//! observers see them and how they are put on the wire.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coords::GlobalCoord;
use crate::enums::LoadState;
use crate::ids::ActorId;

/// A tile moved between load states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileStateChange {
    /// The tile that transitioned.
    pub tile: GlobalCoord,
    /// State before the transition.
    pub from: LoadState,
    /// State after the transition.
    pub to: LoadState,
    /// Fast tick counter at the time of the transition.
    pub tick: u64,
    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}

/// The set of tiles around a tracked actor changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorViewChange {
    /// The tracked actor.
    pub actor: ActorId,
    /// Tiles that became visible to the actor.
    pub entered: BTreeSet<GlobalCoord>,
    /// Tiles that are no longer visible to the actor.
    pub left: BTreeSet<GlobalCoord>,
    /// Fast tick counter at the time of the change.
    pub tick: u64,
    /// Wall-clock time of the change.
    pub at: DateTime<Utc>,
}

/// Everything the core publishes to its notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// See [`TileStateChange`].
    TileStateChanged(TileStateChange),
    /// See [`ActorViewChange`].
    ActorViewChanged(ActorViewChange),
}
