//! Authoritative actor-to-tile map for tracked actors.
//!
//! The registrar is the one piece of interest-management state written
//! from many threads. Reads take a shared lock, writes take an exclusive
//! one. Every successful mutation raises an atomic dirty flag after its
//! lock is released, so a concurrent reader may see stale dirtiness and
//! defer a recomputation by a tick, but never skip it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tessera_types::{ActorId, GlobalCoord};
use tessera_world::{Actor, WorldError};
use tracing::{debug, warn};

use crate::composer::{RefreshSummary, WorldComposer};

/// Tracked actors and the tile each one stands on.
#[derive(Debug, Default)]
pub struct ActorRegistrar {
    /// Actor to current tile.
    actors: RwLock<BTreeMap<ActorId, GlobalCoord>>,
    /// Set when the map changed since the last recomputation.
    dirty: AtomicBool,
}

impl ActorRegistrar {
    /// Create an empty registrar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an actor at its current tile.
    ///
    /// Returns `false` without error if the actor has no tile or is
    /// already tracked.
    pub fn register_unique(&self, actor: &Actor) -> bool {
        let Some(tile) = actor.tile() else {
            warn!(actor = %actor.id(), name = actor.name(), "Cannot track actor without a tile");
            return false;
        };
        let inserted = {
            let mut actors = self.actors.write();
            if actors.contains_key(&actor.id()) {
                false
            } else {
                actors.insert(actor.id(), tile);
                true
            }
        };
        if inserted {
            self.mark_dirty();
            debug!(actor = %actor.id(), %tile, "Actor tracked");
        }
        inserted
    }

    /// Stop tracking an actor. Returns `false` if it was not tracked.
    pub fn unregister_unique(&self, actor: ActorId) -> bool {
        let removed = self.actors.write().remove(&actor).is_some();
        if removed {
            self.mark_dirty();
            debug!(%actor, "Actor untracked");
        }
        removed
    }

    /// Record a tracked actor's new tile.
    ///
    /// Returns `false` if the actor is untracked, has no tile, or has not
    /// actually changed tile.
    pub fn on_actor_moved(&self, actor: &Actor) -> bool {
        let Some(tile) = actor.tile() else {
            return false;
        };
        let changed = {
            let mut actors = self.actors.write();
            match actors.get_mut(&actor.id()) {
                Some(recorded) if *recorded != tile => {
                    *recorded = tile;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.mark_dirty();
        }
        changed
    }

    /// Whether a recomputation is pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Number of tracked actors.
    pub fn count(&self) -> usize {
        self.actors.read().len()
    }

    /// Tile a tracked actor was last recorded on.
    pub fn tile_of(&self, actor: ActorId) -> Option<GlobalCoord> {
        self.actors.read().get(&actor).copied()
    }

    /// Point-in-time copy of the whole map.
    pub fn snapshot(&self) -> BTreeMap<ActorId, GlobalCoord> {
        self.actors.read().clone()
    }

    /// If anything changed, hand a snapshot to the composer.
    ///
    /// Returns `Ok(None)` when nothing was dirty.
    ///
    /// # Errors
    ///
    /// Propagates the composer's error. The registrar is marked dirty
    /// again so the next call retries.
    pub fn update_if_needed(
        &self,
        composer: &mut WorldComposer,
    ) -> Result<Option<RefreshSummary>, WorldError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(None);
        }
        let snapshot = self.snapshot();
        match composer.refresh(&snapshot) {
            Ok(summary) => Ok(Some(summary)),
            Err(err) => {
                self.mark_dirty();
                Err(err)
            }
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}
