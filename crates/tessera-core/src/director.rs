//! Orchestration of world-mutating requests onto the tick thread.
//!
//! Any thread may ask for an actor to be spawned or moved through a
//! cloneable [`DirectorHandle`]. Requests land in lock-free queues and
//! are drained by the [`Director`] on Fast ticks only, in a fixed order:
//!
//! 1. spawn queue
//! 2. move queue
//! 3. registrar / composer refresh
//! 4. Hot and Warm tile fan-out
//!
//! A "spawn then move" pair sent in the same tick window therefore
//! resolves in that order, and the working set computed in a tick already
//! reflects every move completed in it. Each request returns a
//! [`Completion`] that resolves to the tile the actor ended up on, or
//! `None` if the request could not be satisfied.
//!
//! An actor whose tile goes Cold is cleared from the world by the
//! composer; the director then clears the actor's own position so it can
//! be spawned again.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tessera_types::{ActorId, GlobalCoord, TickRate};
use tessera_world::{ActorRef, TickStamp, World, WorldError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::composer::WorldComposer;
use crate::config::DirectorConfig;
use crate::metronome::TickCounters;
use crate::registrar::ActorRegistrar;

/// Errors that abort a director tick.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// A world invariant was violated while applying a request or refresh.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}

/// Resolves to the actor's tile once its request is processed.
pub type Completion = oneshot::Receiver<Option<GlobalCoord>>;

/// A queued spawn.
#[derive(Debug)]
struct SpawnRequest {
    actor: ActorRef,
    target: GlobalCoord,
    search_radius: u32,
    /// Fast ticks this request has already been requeued.
    attempts: u32,
    reply: oneshot::Sender<Option<GlobalCoord>>,
}

/// A queued move.
#[derive(Debug)]
struct MoveRequest {
    actor: ActorRef,
    target: GlobalCoord,
    reply: oneshot::Sender<Option<GlobalCoord>>,
}

/// Outcome of one spawn attempt.
enum SpawnOutcome {
    Placed,
    Unresolved(SpawnRequest),
}

/// Request counts drained in one Fast tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Spawns that placed their actor.
    pub spawned: usize,
    /// Spawns put back for a later tick.
    pub requeued: usize,
    /// Spawns and moves that resolved to nothing.
    pub failed: usize,
    /// Moves that completed.
    pub moved: usize,
}

/// Thread-safe entry point for requests into the tick thread.
#[derive(Debug, Clone)]
pub struct DirectorHandle {
    /// Spawn queue producer.
    spawn_tx: Sender<SpawnRequest>,
    /// Move queue producer.
    move_tx: Sender<MoveRequest>,
    /// Tracked actors.
    registrar: Arc<ActorRegistrar>,
    /// Shared tick counters.
    counters: Arc<TickCounters>,
    /// Ring radius used when a caller does not pick one.
    default_search_radius: u32,
}

impl DirectorHandle {
    /// Queue a spawn at `(x, z)`, searching up to `search_radius` rings
    /// (or the configured default) around it if that tile is blocked.
    pub fn request_spawn(
        &self,
        actor: ActorRef,
        x: i32,
        z: i32,
        search_radius: Option<u32>,
    ) -> Completion {
        let (reply, completion) = oneshot::channel();
        let request = SpawnRequest {
            actor,
            target: GlobalCoord::new(x, z),
            search_radius: search_radius.unwrap_or(self.default_search_radius),
            attempts: 0,
            reply,
        };
        if self.spawn_tx.send(request).is_err() {
            warn!(x, z, "Spawn requested after the director shut down");
        }
        completion
    }

    /// Queue a move to `(x, z)`. Fails fast if that tile is blocked or
    /// outside the world.
    pub fn request_move(&self, actor: ActorRef, x: i32, z: i32) -> Completion {
        let (reply, completion) = oneshot::channel();
        let request = MoveRequest {
            actor,
            target: GlobalCoord::new(x, z),
            reply,
        };
        if self.move_tx.send(request).is_err() {
            warn!(x, z, "Move requested after the director shut down");
        }
        completion
    }

    /// Tracked actors.
    pub const fn registrar(&self) -> &Arc<ActorRegistrar> {
        &self.registrar
    }

    /// Shared tick counters.
    pub const fn counters(&self) -> &Arc<TickCounters> {
        &self.counters
    }

    /// Spawns waiting to be drained.
    pub fn pending_spawns(&self) -> usize {
        self.spawn_tx.len()
    }

    /// Moves waiting to be drained.
    pub fn pending_moves(&self) -> usize {
        self.move_tx.len()
    }
}

/// Owner of the world state on the tick thread.
#[derive(Debug)]
pub struct Director {
    /// Working-set engine, which owns the world.
    composer: WorldComposer,
    /// Tracked actors, shared with every handle.
    registrar: Arc<ActorRegistrar>,
    /// Spawn queue producer, kept for requeueing and handles.
    spawn_tx: Sender<SpawnRequest>,
    /// Spawn queue consumer.
    spawn_rx: Receiver<SpawnRequest>,
    /// Move queue producer, kept for handles.
    move_tx: Sender<MoveRequest>,
    /// Move queue consumer.
    move_rx: Receiver<MoveRequest>,
    /// Request policy.
    config: DirectorConfig,
    /// Every actor currently standing on a tile.
    placed: BTreeMap<ActorId, ActorRef>,
}

impl Director {
    /// Create a director with empty queues.
    pub fn new(
        composer: WorldComposer,
        registrar: Arc<ActorRegistrar>,
        config: DirectorConfig,
    ) -> Self {
        let (spawn_tx, spawn_rx) = crossbeam_channel::unbounded();
        let (move_tx, move_rx) = crossbeam_channel::unbounded();
        Self {
            composer,
            registrar,
            spawn_tx,
            spawn_rx,
            move_tx,
            move_rx,
            config,
            placed: BTreeMap::new(),
        }
    }

    /// A new handle onto this director's queues.
    pub fn handle(&self) -> DirectorHandle {
        DirectorHandle {
            spawn_tx: self.spawn_tx.clone(),
            move_tx: self.move_tx.clone(),
            registrar: Arc::clone(&self.registrar),
            counters: Arc::clone(self.composer.counters()),
            default_search_radius: self.config.spawn_search_radius,
        }
    }

    /// The working-set engine.
    pub const fn composer(&self) -> &WorldComposer {
        &self.composer
    }

    /// The working-set engine, mutably.
    pub const fn composer_mut(&mut self) -> &mut WorldComposer {
        &mut self.composer
    }

    /// Tracked actors.
    pub const fn registrar(&self) -> &Arc<ActorRegistrar> {
        &self.registrar
    }

    /// Number of actors currently standing on a tile.
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    // -------------------------------------------------------------------
    // Tick entry point
    // -------------------------------------------------------------------

    /// Run one tick of `rate`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectorError`] if a world invariant breaks. The metronome
    /// treats that as fatal.
    pub fn on_tick(&mut self, rate: TickRate) -> Result<(), DirectorError> {
        if rate == TickRate::Fast {
            let mut drained = self.drain_spawns()?;
            let moves = self.drain_moves()?;
            drained.moved = moves.moved;
            drained.failed = drained.failed.saturating_add(moves.failed);
            if drained != DrainSummary::default() {
                debug!(
                    spawned = drained.spawned,
                    requeued = drained.requeued,
                    moved = drained.moved,
                    failed = drained.failed,
                    "Request queues drained"
                );
            }
            self.registrar.update_if_needed(&mut self.composer)?;
            self.release_evicted();
        }
        self.composer.active_tick(rate);
        self.composer.warm_tick(rate);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Spawns
    // -------------------------------------------------------------------

    /// Process the spawns queued when the drain started. Requeued
    /// requests wait for the next Fast tick.
    ///
    /// # Errors
    ///
    /// Returns [`DirectorError`] if waking a zone or placing an agent
    /// breaks a world invariant.
    pub fn drain_spawns(&mut self) -> Result<DrainSummary, DirectorError> {
        let mut summary = DrainSummary::default();
        let stamp = self.composer.counters().stamp();
        for _ in 0..self.spawn_rx.len() {
            let Ok(request) = self.spawn_rx.try_recv() else {
                break;
            };
            if request.reply.is_closed() {
                debug!(actor = %request.actor.id(), "Spawn abandoned by caller");
                continue;
            }
            if let Some(tile) = request.actor.tile() {
                warn!(actor = %request.actor.id(), %tile, "Actor is already placed, spawn ignored");
                let _ = request.reply.send(None);
                summary.failed = summary.failed.saturating_add(1);
                continue;
            }
            match self.try_spawn(request, &stamp)? {
                SpawnOutcome::Placed => summary.spawned = summary.spawned.saturating_add(1),
                SpawnOutcome::Unresolved(request) => {
                    if self.requeue(request) {
                        summary.requeued = summary.requeued.saturating_add(1);
                    } else {
                        summary.failed = summary.failed.saturating_add(1);
                    }
                }
            }
        }
        Ok(summary)
    }

    fn try_spawn(
        &mut self,
        request: SpawnRequest,
        stamp: &TickStamp,
    ) -> Result<SpawnOutcome, DirectorError> {
        let world = self.composer.world_mut();
        let Some(tile) =
            find_open_tile(world, request.target, request.search_radius, stamp)?
        else {
            return Ok(SpawnOutcome::Unresolved(request));
        };
        let actor = request.actor;
        if let Some(t) = world.tile_mut(tile) {
            t.place_agent(actor.occupant())?;
        }
        actor.set_tile(Some(tile));
        self.placed.insert(actor.id(), Arc::clone(&actor));
        if actor.is_unique() {
            self.registrar.register_unique(&actor);
        } else {
            self.registrar.on_actor_moved(&actor);
        }
        info!(actor = %actor.id(), name = actor.name(), %tile, "Actor spawned");
        let _ = request.reply.send(Some(tile));
        Ok(SpawnOutcome::Placed)
    }

    /// Put an unresolved spawn back, or fail it once it has used up its
    /// retries. Returns `true` if requeued.
    fn requeue(&self, mut request: SpawnRequest) -> bool {
        request.attempts = request.attempts.saturating_add(1);
        if request.attempts > self.config.spawn_retry_limit {
            warn!(
                actor = %request.actor.id(),
                target = %request.target,
                attempts = request.attempts,
                "Spawn gave up, no open tile"
            );
            let _ = request.reply.send(None);
            return false;
        }
        debug!(
            actor = %request.actor.id(),
            target = %request.target,
            attempts = request.attempts,
            "Spawn requeued"
        );
        // The director holds a receiver, so the queue is still open.
        let _ = self.spawn_tx.send(request);
        true
    }

    /// Clear the position of every actor the composer evicted.
    fn release_evicted(&mut self) {
        for id in self.composer.take_evicted() {
            let Some(actor) = self.placed.remove(&id) else {
                continue;
            };
            let tile = actor.tile();
            actor.set_tile(None);
            info!(actor = %id, name = actor.name(), ?tile, "Evicted actor released");
        }
    }

    // -------------------------------------------------------------------
    // Moves
    // -------------------------------------------------------------------

    /// Process the moves queued when the drain started.
    ///
    /// # Errors
    ///
    /// Returns [`DirectorError`] if waking a zone or placing an agent
    /// breaks a world invariant.
    pub fn drain_moves(&mut self) -> Result<DrainSummary, DirectorError> {
        let mut summary = DrainSummary::default();
        let stamp = self.composer.counters().stamp();
        for _ in 0..self.move_rx.len() {
            let Ok(request) = self.move_rx.try_recv() else {
                break;
            };
            let result = self.try_move(&request, &stamp)?;
            if result.is_some() {
                summary.moved = summary.moved.saturating_add(1);
            } else {
                summary.failed = summary.failed.saturating_add(1);
            }
            let _ = request.reply.send(result);
        }
        Ok(summary)
    }

    fn try_move(
        &mut self,
        request: &MoveRequest,
        stamp: &TickStamp,
    ) -> Result<Option<GlobalCoord>, DirectorError> {
        let actor = &request.actor;
        let target = request.target;
        let Some(from) = actor.tile() else {
            warn!(actor = %actor.id(), %target, "Cannot move an actor that was never placed");
            return Ok(None);
        };
        if from == target {
            return Ok(Some(target));
        }

        let world = self.composer.world_mut();
        match world.wake_tile(target, stamp)? {
            Some(tile) if !tile.is_blocked() => tile.place_agent(actor.occupant())?,
            Some(_) => {
                debug!(actor = %actor.id(), %target, "Move target is blocked");
                return Ok(None);
            }
            None => {
                debug!(actor = %actor.id(), %target, "Move target is outside the world");
                return Ok(None);
            }
        }
        if let Some(old) = world.tile_mut(from) {
            if old.agent().is_some_and(|agent| agent.actor == actor.id()) {
                old.take_agent();
            }
        }
        actor.set_tile(Some(target));
        self.registrar.on_actor_moved(actor);
        debug!(actor = %actor.id(), %from, to = %target, "Actor moved");
        Ok(Some(target))
    }
}

/// The requested tile if open, otherwise the first open tile on rings
/// `1..=radius` around it. Each ring holds exactly the tiles at that
/// Chebyshev distance, visited row by row. Wakes every zone it looks at.
fn find_open_tile(
    world: &mut World,
    origin: GlobalCoord,
    radius: u32,
    stamp: &TickStamp,
) -> Result<Option<GlobalCoord>, WorldError> {
    match world.wake_tile(origin, stamp)? {
        None => return Ok(None),
        Some(tile) if !tile.is_blocked() => return Ok(Some(origin)),
        Some(_) => {}
    }
    let radius = i32::try_from(radius).unwrap_or(i32::MAX);
    for ring in 1..=radius {
        let edge = ring.unsigned_abs();
        for dz in 0_i32.saturating_sub(ring)..=ring {
            for dx in 0_i32.saturating_sub(ring)..=ring {
                if dx.unsigned_abs().max(dz.unsigned_abs()) != edge {
                    continue;
                }
                let Some(candidate) = origin.offset(dx, dz) else {
                    continue;
                };
                if let Some(tile) = world.wake_tile(candidate, stamp)? {
                    if !tile.is_blocked() {
                        return Ok(Some(candidate));
                    }
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tessera_world::{Actor, WorldDimensions};

    use super::*;
    use crate::config::{ComposerConfig, TickConfig};
    use crate::notify::NullSink;

    fn director(retry_limit: u32) -> Director {
        director_with(retry_limit, false)
    }

    fn director_with(retry_limit: u32, unload_idle_zones: bool) -> Director {
        let world = World::new(
            "test",
            WorldDimensions {
                zones_x: 2,
                zones_z: 1,
                zone_width: 16,
                zone_depth: 16,
            },
        )
        .unwrap();
        let counters = Arc::new(TickCounters::new(&TickConfig::default()));
        let config = ComposerConfig {
            hot_radius: 1,
            warm_radius_multiplier: 2.0,
            unload_idle_zones,
        };
        let composer = WorldComposer::new(world, counters, Arc::new(NullSink), &config);
        Director::new(
            composer,
            Arc::new(ActorRegistrar::new()),
            DirectorConfig {
                spawn_search_radius: 2,
                spawn_retry_limit: retry_limit,
                stop_timeout_ms: 1000,
            },
        )
    }

    fn block(director: &mut Director, x: i32, z: i32) {
        let stamp = director.composer().counters().stamp();
        director
            .composer_mut()
            .world_mut()
            .wake_tile(GlobalCoord::new(x, z), &stamp)
            .unwrap()
            .unwrap()
            .set_solid(true);
    }

    #[tokio::test]
    async fn spawn_places_actor_on_requested_tile() {
        let mut director = director(3);
        let handle = director.handle();
        let actor = Actor::new("wanderer").into_ref();

        let done = handle.request_spawn(Arc::clone(&actor), 4, 4, None);
        director.on_tick(TickRate::Fast).unwrap();

        assert_eq!(done.await.unwrap(), Some(GlobalCoord::new(4, 4)));
        assert_eq!(actor.tile(), Some(GlobalCoord::new(4, 4)));
        let tile = director.composer().world().tile(GlobalCoord::new(4, 4)).unwrap();
        assert_eq!(tile.agent().map(|a| a.actor), Some(actor.id()));
    }

    #[tokio::test]
    async fn spawn_finds_the_only_open_tile_on_ring_two() {
        let mut director = director(3);
        let origin = GlobalCoord::new(8, 8);
        let open = GlobalCoord::new(10, 7);
        for dz in -2..=2 {
            for dx in -2..=2 {
                let tile = origin.offset(dx, dz).unwrap();
                if tile != open {
                    block(&mut director, tile.x, tile.z);
                }
            }
        }

        let actor = Actor::new("late").into_ref();
        let done = director.handle().request_spawn(Arc::clone(&actor), 8, 8, Some(2));
        director.on_tick(TickRate::Fast).unwrap();

        assert_eq!(done.await.unwrap(), Some(open));
    }

    #[tokio::test]
    async fn ring_search_stops_at_the_nearest_ring() {
        let mut director = director(3);
        block(&mut director, 8, 8);
        let actor = Actor::new("near").into_ref();
        let done = director.handle().request_spawn(actor, 8, 8, Some(2));
        director.on_tick(TickRate::Fast).unwrap();

        let tile = done.await.unwrap().unwrap();
        assert_eq!(tile.chebyshev(GlobalCoord::new(8, 8)), 1);
        // First tile of ring one in row order.
        assert_eq!(tile, GlobalCoord::new(7, 7));
    }

    #[tokio::test]
    async fn blocked_spawn_retries_then_gives_up() {
        let mut director = director(2);
        block(&mut director, 1, 1);
        let handle = director.handle();
        let actor = Actor::new("stuck").into_ref();
        let mut done = handle.request_spawn(Arc::clone(&actor), 1, 1, Some(0));

        director.on_tick(TickRate::Fast).unwrap();
        director.on_tick(TickRate::Fast).unwrap();
        assert!(done.try_recv().is_err());
        assert_eq!(handle.pending_spawns(), 1);

        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(done.await.unwrap(), None);
        assert_eq!(handle.pending_spawns(), 0);
        assert!(actor.tile().is_none());
    }

    #[tokio::test]
    async fn requeued_spawn_succeeds_once_tile_clears() {
        let mut director = director(10);
        block(&mut director, 1, 1);
        let actor = Actor::new("patient").into_ref();
        let done = director.handle().request_spawn(actor, 1, 1, Some(0));

        director.on_tick(TickRate::Fast).unwrap();
        director
            .composer_mut()
            .world_mut()
            .tile_mut(GlobalCoord::new(1, 1))
            .unwrap()
            .set_solid(false);
        director.on_tick(TickRate::Fast).unwrap();

        assert_eq!(done.await.unwrap(), Some(GlobalCoord::new(1, 1)));
    }

    #[tokio::test]
    async fn out_of_world_spawn_is_bounded() {
        let mut director = director(1);
        let done = director
            .handle()
            .request_spawn(Actor::new("lost").into_ref(), -50, 3, None);
        director.on_tick(TickRate::Fast).unwrap();
        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(done.await.unwrap(), None);
    }

    #[tokio::test]
    async fn spawns_only_drain_on_fast_ticks() {
        let mut director = director(3);
        let handle = director.handle();
        let mut done = handle.request_spawn(Actor::new("slow").into_ref(), 2, 2, None);
        director.on_tick(TickRate::Normal).unwrap();
        director.on_tick(TickRate::Slow).unwrap();
        assert!(done.try_recv().is_err());

        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(done.await.unwrap(), Some(GlobalCoord::new(2, 2)));
    }

    #[tokio::test]
    async fn unique_actor_is_tracked_and_heats_its_tiles() {
        let mut director = director(3);
        let hero = Actor::new("hero").unique().into_ref();
        let done = director.handle().request_spawn(Arc::clone(&hero), 5, 5, None);
        director.on_tick(TickRate::Fast).unwrap();

        assert_eq!(done.await.unwrap(), Some(GlobalCoord::new(5, 5)));
        assert_eq!(director.registrar().count(), 1);
        assert_eq!(director.composer().hot().len(), 9);
    }

    #[tokio::test]
    async fn spawn_then_move_in_one_tick() {
        let mut director = director(3);
        let handle = director.handle();
        let hero = Actor::new("hero").unique().into_ref();
        let spawned = handle.request_spawn(Arc::clone(&hero), 3, 3, None);
        let moved = handle.request_move(Arc::clone(&hero), 20, 3);
        director.on_tick(TickRate::Fast).unwrap();

        assert_eq!(spawned.await.unwrap(), Some(GlobalCoord::new(3, 3)));
        assert_eq!(moved.await.unwrap(), Some(GlobalCoord::new(20, 3)));
        let world = director.composer().world();
        assert!(world.tile(GlobalCoord::new(3, 3)).unwrap().agent().is_none());
        assert!(director.composer().hot().contains(&GlobalCoord::new(20, 3)));
        assert!(!director.composer().hot().contains(&GlobalCoord::new(3, 3)));
    }

    #[tokio::test]
    async fn blocked_move_fails_fast() {
        let mut director = director(3);
        let handle = director.handle();
        let actor = Actor::new("walker").into_ref();
        let spawned = handle.request_spawn(Arc::clone(&actor), 3, 3, None);
        director.on_tick(TickRate::Fast).unwrap();
        assert!(spawned.await.unwrap().is_some());

        block(&mut director, 4, 3);
        let blocked = handle.request_move(Arc::clone(&actor), 4, 3);
        let outside = handle.request_move(Arc::clone(&actor), 3, 99);
        director.on_tick(TickRate::Fast).unwrap();

        assert_eq!(blocked.await.unwrap(), None);
        assert_eq!(outside.await.unwrap(), None);
        assert_eq!(actor.tile(), Some(GlobalCoord::new(3, 3)));
        assert_eq!(handle.pending_moves(), 0);
    }

    #[tokio::test]
    async fn move_before_spawn_resolves_to_none() {
        let mut director = director(3);
        let done = director
            .handle()
            .request_move(Actor::new("nobody").into_ref(), 1, 1);
        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(done.await.unwrap(), None);
    }

    #[tokio::test]
    async fn resting_npc_keeps_its_zone_and_its_tile() {
        let mut director = director_with(3, true);
        let handle = director.handle();
        let npc = Actor::new("npc").into_ref();
        let hero = Actor::new("hero").unique().into_ref();
        let npc_done = handle.request_spawn(Arc::clone(&npc), 20, 3, Some(0));
        let hero_done = handle.request_spawn(Arc::clone(&hero), 3, 3, None);
        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(npc_done.await.unwrap(), Some(GlobalCoord::new(20, 3)));
        assert!(hero_done.await.unwrap().is_some());

        let world = director.composer().world();
        assert_eq!(world.loaded_zone_count(), 2);
        let tile = world.tile(GlobalCoord::new(20, 3)).unwrap();
        assert_eq!(tile.agent().map(|a| a.actor), Some(npc.id()));

        let other = Actor::new("other").into_ref();
        let other_done = handle.request_spawn(Arc::clone(&other), 20, 3, None);
        director.on_tick(TickRate::Fast).unwrap();
        let landed = other_done.await.unwrap().unwrap();
        assert_ne!(landed, GlobalCoord::new(20, 3));
        assert_eq!(npc.tile(), Some(GlobalCoord::new(20, 3)));
        assert_eq!(director.placed_count(), 3);
    }

    #[tokio::test]
    async fn npc_evicted_by_departing_hero_can_spawn_again() {
        let mut director = director(3);
        let handle = director.handle();
        let hero = Actor::new("hero").unique().into_ref();
        let npc = Actor::new("npc").into_ref();
        let hero_done = handle.request_spawn(Arc::clone(&hero), 3, 3, None);
        let npc_done = handle.request_spawn(Arc::clone(&npc), 4, 3, Some(0));
        director.on_tick(TickRate::Fast).unwrap();
        assert!(hero_done.await.unwrap().is_some());
        assert_eq!(npc_done.await.unwrap(), Some(GlobalCoord::new(4, 3)));
        assert!(director.composer().hot().contains(&GlobalCoord::new(4, 3)));

        let moved = handle.request_move(Arc::clone(&hero), 25, 10);
        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(moved.await.unwrap(), Some(GlobalCoord::new(25, 10)));
        assert_eq!(npc.tile(), None);
        assert_eq!(director.placed_count(), 1);
        let old = director.composer().world().tile(GlobalCoord::new(4, 3)).unwrap();
        assert!(old.agent().is_none());

        let respawned = handle.request_spawn(Arc::clone(&npc), 4, 3, Some(0));
        director.on_tick(TickRate::Fast).unwrap();
        assert_eq!(respawned.await.unwrap(), Some(GlobalCoord::new(4, 3)));
        assert_eq!(npc.tile(), Some(GlobalCoord::new(4, 3)));
    }
}
