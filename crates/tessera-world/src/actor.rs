//! Actor handles shared between producer threads and the tick thread.
//!
//! An [`Actor`] is created by gameplay or network code and then handed to
//! the director as an [`ActorRef`]. Its position is the authoritative
//! "which tile am I on" record; only the tick thread writes it (when a
//! spawn or move completes), but any thread may read it, so it sits
//! behind a small lock.
//!
//! Capabilities are plain flags checked directly:
//!
//! - `unique` -- the actor drives working-set computation (players,
//!   bosses) and is registered with the registrar once it spawns.
//! - `zone_activator` -- while the actor stands in a zone, that zone is
//!   considered active and will not be unloaded.

use std::sync::Arc;

use parking_lot::RwLock;
use tessera_types::{ActorId, GlobalCoord};

/// Shared handle to an actor.
pub type ActorRef = Arc<Actor>;

/// A world actor: identity, capability flags, and current tile.
#[derive(Debug)]
pub struct Actor {
    /// Stable identity.
    id: ActorId,
    /// Display name, for logs.
    name: String,
    /// Whether the actor's position drives the hot/warm working set.
    unique: bool,
    /// Whether the actor keeps its zone loaded.
    zone_activator: bool,
    /// Tile the actor currently stands on, if spawned.
    tile: RwLock<Option<GlobalCoord>>,
}

impl Actor {
    /// Create an actor with no capabilities and no position.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            unique: false,
            zone_activator: false,
            tile: RwLock::new(None),
        }
    }

    /// Mark the actor as tracked (drives the working set).
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the actor as a zone activator.
    #[must_use]
    pub fn zone_activator(mut self) -> Self {
        self.zone_activator = true;
        self
    }

    /// Wrap the actor in a shared handle.
    pub fn into_ref(self) -> ActorRef {
        Arc::new(self)
    }

    /// The actor's identity.
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// The actor's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the actor is tracked.
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether the actor keeps its zone active.
    pub const fn is_zone_activator(&self) -> bool {
        self.zone_activator
    }

    /// The tile the actor stands on, or `None` if not spawned.
    pub fn tile(&self) -> Option<GlobalCoord> {
        *self.tile.read()
    }

    /// Record a new position. Called from the tick thread only.
    pub fn set_tile(&self, tile: Option<GlobalCoord>) {
        *self.tile.write() = tile;
    }

    /// The occupancy record this actor leaves on a tile.
    pub const fn occupant(&self) -> Occupant {
        Occupant {
            actor: self.id,
            zone_activator: self.zone_activator,
        }
    }
}

/// What a tile stores about the agent standing on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    /// The agent.
    pub actor: ActorId,
    /// Copied from the actor's capability flag.
    pub zone_activator: bool,
}
