//! Tiered working-set engine.
//!
//! Given where every tracked actor stands, the composer decides which
//! tiles are Hot (near an actor, full-rate simulation), Warm (further
//! out, reduced-rate standby), or Cold (neither), and performs the
//! minimum set of lifecycle transitions to get there.
//!
//! # Refresh
//!
//! 1. Scan a square of Chebyshev radius `max(hot, warm)` around every
//!    actor, loading zones on demand. A tile is desired Hot when its
//!    squared Euclidean distance is at most `hot^2 + hot`, otherwise
//!    desired Warm when within the warm radius.
//! 2. Hot always wins: anything desired Hot by anyone leaves the warm set.
//! 3. Diff against the current Hot/Warm sets into six disjoint
//!    transition sets and apply them Cold-first:
//!    Hot->Cold, Warm->Cold, Hot->Warm, New->Warm, Warm->Hot, New->Hot.
//!    A new Hot tile passes through Warm so it gets its catch-up.
//! 4. Publish each actor's view diff and unload zones left idle. A zone
//!    is idle when every tile is Cold and none carries an agent, items,
//!    terrain or behaviors.
//!
//! Occupants cleared by a Cold transition are remembered until the owner
//! collects them with [`WorldComposer::take_evicted`].
//!
//! The composer is owned by the tick thread and takes no locks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tessera_types::{
    ActorId, ActorViewChange, GlobalCoord, Notification, TickRate, TileStateChange, ZoneCoord,
};
use tessera_world::{TickStamp, Transition, World, WorldError};
use tracing::{debug, info, warn};

use crate::config::ComposerConfig;
use crate::metronome::TickCounters;
use crate::notify::NotificationSink;

/// Counts of what one refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Tiles demoted from Hot to Cold.
    pub hot_to_cold: usize,
    /// Tiles demoted from Warm to Cold.
    pub warm_to_cold: usize,
    /// Tiles demoted from Hot to Warm.
    pub hot_to_warm: usize,
    /// Tiles loaded as Warm.
    pub new_to_warm: usize,
    /// Tiles promoted from Warm to Hot.
    pub warm_to_hot: usize,
    /// Tiles loaded straight to Hot (through Warm).
    pub new_to_hot: usize,
    /// Occupants cleared by Cold transitions.
    pub evicted: usize,
    /// Zones loaded by the proximity scan.
    pub zones_loaded: usize,
    /// Idle zones unloaded afterwards.
    pub zones_unloaded: usize,
}

impl RefreshSummary {
    /// Total tile transitions.
    pub const fn transitions(&self) -> usize {
        self.hot_to_cold
            .saturating_add(self.warm_to_cold)
            .saturating_add(self.hot_to_warm)
            .saturating_add(self.new_to_warm)
            .saturating_add(self.warm_to_hot)
            .saturating_add(self.new_to_hot)
    }
}

/// Hot/Warm working set over a [`World`].
pub struct WorldComposer {
    /// The tile graph. Only the tick thread touches it.
    world: World,
    /// Shared tick counters, read for catch-up stamps.
    counters: Arc<TickCounters>,
    /// Where transition and view notifications go.
    sink: Arc<dyn NotificationSink>,
    /// Hot radius in tiles.
    hot_radius: u32,
    /// Warm radius in tiles.
    warm_radius: u32,
    /// Unload idle zones after each refresh.
    unload_idle_zones: bool,
    /// Tiles currently Hot.
    hot: BTreeSet<GlobalCoord>,
    /// Tiles currently Warm.
    warm: BTreeSet<GlobalCoord>,
    /// Tiles each tracked actor saw at the last refresh.
    views: BTreeMap<ActorId, BTreeSet<GlobalCoord>>,
    /// Actors cleared off tiles that went Cold, not yet collected.
    evicted: Vec<ActorId>,
}

impl core::fmt::Debug for WorldComposer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorldComposer")
            .field("world", &self.world.name())
            .field("hot_radius", &self.hot_radius)
            .field("warm_radius", &self.warm_radius)
            .field("hot", &self.hot.len())
            .field("warm", &self.warm.len())
            .field("views", &self.views.len())
            .field("evicted", &self.evicted.len())
            .finish_non_exhaustive()
    }
}

impl WorldComposer {
    /// Create a composer over a world with nothing Hot or Warm.
    pub fn new(
        world: World,
        counters: Arc<TickCounters>,
        sink: Arc<dyn NotificationSink>,
        config: &ComposerConfig,
    ) -> Self {
        Self {
            world,
            counters,
            sink,
            hot_radius: config.hot_radius,
            warm_radius: config.warm_radius(),
            unload_idle_zones: config.unload_idle_zones,
            hot: BTreeSet::new(),
            warm: BTreeSet::new(),
            views: BTreeMap::new(),
            evicted: Vec::new(),
        }
    }

    /// The world.
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    pub const fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The shared tick counters.
    pub const fn counters(&self) -> &Arc<TickCounters> {
        &self.counters
    }

    /// Hot radius in tiles.
    pub const fn hot_radius(&self) -> u32 {
        self.hot_radius
    }

    /// Warm radius in tiles.
    pub const fn warm_radius(&self) -> u32 {
        self.warm_radius
    }

    /// Tiles currently Hot.
    pub const fn hot(&self) -> &BTreeSet<GlobalCoord> {
        &self.hot
    }

    /// Tiles currently Warm.
    pub const fn warm(&self) -> &BTreeSet<GlobalCoord> {
        &self.warm
    }

    /// Tiles an actor saw at the last refresh.
    pub fn view(&self, actor: ActorId) -> Option<&BTreeSet<GlobalCoord>> {
        self.views.get(&actor)
    }

    /// Drain the actors evicted by Cold transitions since the last call.
    pub fn take_evicted(&mut self) -> Vec<ActorId> {
        std::mem::take(&mut self.evicted)
    }

    // -------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------

    /// Recompute the working set for an actor snapshot and apply the
    /// transitions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if a zone fails to load or a tile rejects a
    /// lifecycle edge. Both indicate a broken invariant.
    pub fn refresh(
        &mut self,
        actors: &BTreeMap<ActorId, GlobalCoord>,
    ) -> Result<RefreshSummary, WorldError> {
        let stamp = self.counters.stamp();
        let mut summary = RefreshSummary::default();

        let (desired_hot, desired_warm, views) = self.desired(actors, &stamp, &mut summary)?;

        let hot_to_cold: Vec<GlobalCoord> = self
            .hot
            .iter()
            .filter(|t| !desired_hot.contains(t) && !desired_warm.contains(t))
            .copied()
            .collect();
        let warm_to_cold: Vec<GlobalCoord> = self
            .warm
            .iter()
            .filter(|t| !desired_hot.contains(t) && !desired_warm.contains(t))
            .copied()
            .collect();
        let hot_to_warm: Vec<GlobalCoord> =
            self.hot.intersection(&desired_warm).copied().collect();
        let warm_to_hot: Vec<GlobalCoord> =
            self.warm.intersection(&desired_hot).copied().collect();
        let new_to_warm: Vec<GlobalCoord> = desired_warm
            .iter()
            .filter(|t| !self.hot.contains(t) && !self.warm.contains(t))
            .copied()
            .collect();
        let new_to_hot: Vec<GlobalCoord> = desired_hot
            .iter()
            .filter(|t| !self.hot.contains(t) && !self.warm.contains(t))
            .copied()
            .collect();

        for tile in hot_to_cold {
            summary.evicted = summary.evicted.saturating_add(self.cool(tile, &stamp)?);
            self.hot.remove(&tile);
            summary.hot_to_cold = summary.hot_to_cold.saturating_add(1);
        }
        for tile in warm_to_cold {
            summary.evicted = summary.evicted.saturating_add(self.cool(tile, &stamp)?);
            self.warm.remove(&tile);
            summary.warm_to_cold = summary.warm_to_cold.saturating_add(1);
        }
        for tile in hot_to_warm {
            if let Some(t) = self.world.tile_mut(tile) {
                let transition = t.on_warm_unload()?;
                self.publish_transition(transition, &stamp);
            }
            self.hot.remove(&tile);
            self.warm.insert(tile);
            summary.hot_to_warm = summary.hot_to_warm.saturating_add(1);
        }
        for tile in new_to_warm {
            if let Some(t) = self.world.tile_mut(tile) {
                let transition = t.on_warm_load(&stamp)?;
                self.publish_transition(transition, &stamp);
                self.warm.insert(tile);
                summary.new_to_warm = summary.new_to_warm.saturating_add(1);
            }
        }
        for tile in warm_to_hot {
            if let Some(t) = self.world.tile_mut(tile) {
                let transition = t.on_hot_load()?;
                self.publish_transition(transition, &stamp);
            }
            self.warm.remove(&tile);
            self.hot.insert(tile);
            summary.warm_to_hot = summary.warm_to_hot.saturating_add(1);
        }
        for tile in new_to_hot {
            if let Some(t) = self.world.tile_mut(tile) {
                let warmed = t.on_warm_load(&stamp)?;
                let heated = t.on_hot_load()?;
                self.publish_transition(warmed, &stamp);
                self.publish_transition(heated, &stamp);
                self.hot.insert(tile);
                summary.new_to_hot = summary.new_to_hot.saturating_add(1);
            }
        }

        self.publish_views(views, &stamp);

        if self.unload_idle_zones {
            summary.zones_unloaded = self.unload_idle()?;
        }

        if summary.transitions() > 0 {
            info!(
                actors = actors.len(),
                hot = self.hot.len(),
                warm = self.warm.len(),
                hot_to_cold = summary.hot_to_cold,
                warm_to_cold = summary.warm_to_cold,
                hot_to_warm = summary.hot_to_warm,
                new_to_warm = summary.new_to_warm,
                warm_to_hot = summary.warm_to_hot,
                new_to_hot = summary.new_to_hot,
                zones_loaded = summary.zones_loaded,
                zones_unloaded = summary.zones_unloaded,
                "Working set refreshed"
            );
        }
        Ok(summary)
    }

    /// Desired Hot set, desired Warm set (Hot removed), and each actor's
    /// view. Loads every zone the scan touches.
    #[allow(clippy::type_complexity)]
    fn desired(
        &mut self,
        actors: &BTreeMap<ActorId, GlobalCoord>,
        stamp: &TickStamp,
        summary: &mut RefreshSummary,
    ) -> Result<
        (
            BTreeSet<GlobalCoord>,
            BTreeSet<GlobalCoord>,
            BTreeMap<ActorId, BTreeSet<GlobalCoord>>,
        ),
        WorldError,
    > {
        let reach = i32::try_from(self.hot_radius.max(self.warm_radius))
            .map_err(|_err| WorldError::ArithmeticOverflow)?;
        let hot = u64::from(self.hot_radius);
        let hot_limit = hot.saturating_mul(hot).saturating_add(hot);
        let warm = u64::from(self.warm_radius);

        let mut desired_hot = BTreeSet::new();
        let mut desired_warm = BTreeSet::new();
        let mut views = BTreeMap::new();

        for (&actor, &center) in actors {
            let mut view = BTreeSet::new();
            for dz in 0_i32.saturating_sub(reach)..=reach {
                for dx in 0_i32.saturating_sub(reach)..=reach {
                    let Some(tile) = center.offset(dx, dz) else {
                        continue;
                    };
                    let Some(address) = self.world.resolve(tile) else {
                        continue;
                    };
                    if self.world.ensure_zone_loaded(address.zone, stamp)? {
                        summary.zones_loaded = summary.zones_loaded.saturating_add(1);
                    }
                    if center.distance_sq(tile) <= hot_limit {
                        desired_hot.insert(tile);
                    } else if center.chebyshev(tile) <= warm {
                        desired_warm.insert(tile);
                    } else {
                        continue;
                    }
                    view.insert(tile);
                }
            }
            views.insert(actor, view);
        }

        desired_warm.retain(|tile| !desired_hot.contains(tile));
        Ok((desired_hot, desired_warm, views))
    }

    /// Send a tile Cold. Returns 1 if an occupant was cleared.
    fn cool(&mut self, tile: GlobalCoord, stamp: &TickStamp) -> Result<usize, WorldError> {
        let Some(t) = self.world.tile_mut(tile) else {
            warn!(%tile, "Tile vanished before its cold unload");
            return Ok(0);
        };
        let unload = t.on_cold_unload(stamp)?;
        if unload.discarded_commands > 0 {
            debug!(%tile, discarded = unload.discarded_commands, "Queued tile commands discarded");
        }
        self.publish_transition(unload.transition, stamp);
        let Some(occupant) = unload.evicted else {
            return Ok(0);
        };
        warn!(%tile, actor = %occupant.actor, "Occupant cleared by cold unload");
        self.evicted.push(occupant.actor);
        Ok(1)
    }

    fn publish_transition(&self, transition: Transition, stamp: &TickStamp) {
        self.sink
            .publish(Notification::TileStateChanged(TileStateChange {
                tile: transition.tile,
                from: transition.from,
                to: transition.to,
                tick: stamp.fast,
                at: Utc::now(),
            }));
    }

    fn publish_views(
        &mut self,
        views: BTreeMap<ActorId, BTreeSet<GlobalCoord>>,
        stamp: &TickStamp,
    ) {
        let empty = BTreeSet::new();
        for (actor, view) in &views {
            let previous = self.views.get(actor).unwrap_or(&empty);
            let entered: BTreeSet<GlobalCoord> = view.difference(previous).copied().collect();
            let left: BTreeSet<GlobalCoord> = previous.difference(view).copied().collect();
            self.publish_view(*actor, entered, left, stamp);
        }
        let departed: Vec<(ActorId, BTreeSet<GlobalCoord>)> = self
            .views
            .iter()
            .filter(|(actor, _)| !views.contains_key(actor))
            .map(|(actor, view)| (*actor, view.clone()))
            .collect();
        for (actor, left) in departed {
            self.publish_view(actor, BTreeSet::new(), left, stamp);
        }
        self.views = views;
    }

    fn publish_view(
        &self,
        actor: ActorId,
        entered: BTreeSet<GlobalCoord>,
        left: BTreeSet<GlobalCoord>,
        stamp: &TickStamp,
    ) {
        if entered.is_empty() && left.is_empty() {
            return;
        }
        self.sink
            .publish(Notification::ActorViewChanged(ActorViewChange {
                actor,
                entered,
                left,
                tick: stamp.fast,
                at: Utc::now(),
            }));
    }

    /// Unload every loaded zone that is idle. Zones holding any agent,
    /// activator or not, stay loaded.
    fn unload_idle(&mut self) -> Result<usize, WorldError> {
        let idle: Vec<ZoneCoord> = self
            .world
            .zones()
            .filter(|zone| zone.is_loaded() && !zone.is_active() && zone.is_idle())
            .map(tessera_world::Zone::coord)
            .collect();
        let mut unloaded = 0_usize;
        for zone in idle {
            self.world.unload_zone(zone)?;
            unloaded = unloaded.saturating_add(1);
        }
        Ok(unloaded)
    }

    // -------------------------------------------------------------------
    // Fan-out
    // -------------------------------------------------------------------

    /// Tick every Hot tile at `rate`.
    pub fn active_tick(&mut self, rate: TickRate) {
        for coord in &self.hot {
            if let Some(tile) = self.world.tile_mut(*coord) {
                tile.on_tick(rate);
            }
        }
    }

    /// Tick every Warm tile at `rate`, at the reduced Warm cadence.
    pub fn warm_tick(&mut self, rate: TickRate) {
        for coord in &self.warm {
            if let Some(tile) = self.world.tile_mut(*coord) {
                tile.on_warm_tick(rate);
            }
        }
    }
}
