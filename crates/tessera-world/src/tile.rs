//! The tile: atomic spatial unit of the world.
//!
//! A [`Tile`] holds at most one agent, any number of items, a set of
//! attached behaviors, a load state, and a command queue. Tiles are only
//! ever mutated from the tick thread; the one exception is the command
//! queue, whose sending half ([`TileCommandSender`]) can be cloned and
//! handed to any thread.
//!
//! # Lifecycle
//!
//! ```text
//!          on_warm_load            on_hot_load
//!   Cold ---------------> Warm ---------------> Hot
//!    ^  <---------------      <---------------
//!    |    on_cold_unload        on_warm_unload
//!    +------------------------------------------+
//!                   on_cold_unload
//! ```
//!
//! Every hook validates the current state and returns a [`Transition`]
//! describing the edge it took, so the caller can publish it.

use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender};
use tessera_types::{GlobalCoord, ItemId, LoadState, LocalCoord, TickRate, ZoneCoord};

use crate::actor::Occupant;
use crate::behavior::{BehaviorKind, TileBehavior, TileContext};
use crate::catch_up::TickStamp;
use crate::error::WorldError;

/// Most neighbors a tile can have on a square grid.
pub const MAX_NEIGHBORS: usize = 8;

/// A unit of work that must run on a specific tile, on the tick thread.
pub type TileCommand = Box<dyn FnOnce(&mut Tile) + Send>;

/// Cloneable, thread-safe handle for enqueueing commands on one tile.
#[derive(Debug, Clone)]
pub struct TileCommandSender {
    /// The tile the commands are for.
    tile: GlobalCoord,
    /// Sending half of the tile's queue.
    tx: Sender<TileCommand>,
}

impl TileCommandSender {
    /// The tile this sender targets.
    pub const fn tile(&self) -> GlobalCoord {
        self.tile
    }

    /// Enqueue a command. Returns `false` if the tile no longer exists.
    pub fn send(&self, command: impl FnOnce(&mut Tile) + Send + 'static) -> bool {
        self.tx.send(Box::new(command)).is_ok()
    }
}

/// A load-state edge taken by one lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The tile.
    pub tile: GlobalCoord,
    /// State before.
    pub from: LoadState,
    /// State after.
    pub to: LoadState,
}

/// What a Cold unload threw away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColdUnload {
    /// The edge taken.
    pub transition: Transition,
    /// The agent that was cleared from the tile, if any.
    pub evicted: Option<Occupant>,
    /// Number of queued commands discarded.
    pub discarded_commands: usize,
}

/// Atomic spatial unit of the world.
pub struct Tile {
    /// Position inside the owning zone.
    local: LocalCoord,
    /// Position in world space.
    global: GlobalCoord,
    /// The owning zone.
    zone: ZoneCoord,
    /// Current load state.
    state: LoadState,
    /// Adjacent tiles, never including self or duplicates.
    neighbors: Vec<GlobalCoord>,
    /// The agent standing here.
    agent: Option<Occupant>,
    /// Items lying here, unordered.
    items: Vec<ItemId>,
    /// Impassable terrain.
    solid: bool,
    /// Attached behaviors by kind.
    behaviors: BTreeMap<BehaviorKind, Box<dyn TileBehavior>>,
    /// Sending half of the command queue, cloned out to producers.
    command_tx: Sender<TileCommand>,
    /// Receiving half, drained on Fast ticks.
    command_rx: Receiver<TileCommand>,
    /// Tick stamp taken when the tile last went Cold.
    cold_since: TickStamp,
}

impl core::fmt::Debug for Tile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tile")
            .field("global", &self.global)
            .field("local", &self.local)
            .field("zone", &self.zone)
            .field("state", &self.state)
            .field("neighbors", &self.neighbors.len())
            .field("agent", &self.agent)
            .field("items", &self.items.len())
            .field("solid", &self.solid)
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .field("pending_commands", &self.command_rx.len())
            .finish_non_exhaustive()
    }
}

impl Tile {
    /// Create a Cold, empty tile.
    pub fn new(local: LocalCoord, global: GlobalCoord, zone: ZoneCoord, stamp: TickStamp) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        Self {
            local,
            global,
            zone,
            state: LoadState::Cold,
            neighbors: Vec::with_capacity(MAX_NEIGHBORS),
            agent: None,
            items: Vec::new(),
            solid: false,
            behaviors: BTreeMap::new(),
            command_tx,
            command_rx,
            cold_since: stamp,
        }
    }

    // -------------------------------------------------------------------
    // Identity and adjacency
    // -------------------------------------------------------------------

    /// Position in world space.
    pub const fn global(&self) -> GlobalCoord {
        self.global
    }

    /// Position inside the owning zone.
    pub const fn local(&self) -> LocalCoord {
        self.local
    }

    /// The owning zone.
    pub const fn zone(&self) -> ZoneCoord {
        self.zone
    }

    /// Current load state.
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// Adjacent tiles.
    pub fn neighbors(&self) -> &[GlobalCoord] {
        &self.neighbors
    }

    /// Add a neighbor. Rejects self, duplicates, and a ninth neighbor.
    pub fn add_neighbor(&mut self, neighbor: GlobalCoord) -> bool {
        if neighbor == self.global
            || self.neighbors.contains(&neighbor)
            || self.neighbors.len() >= MAX_NEIGHBORS
        {
            return false;
        }
        self.neighbors.push(neighbor);
        true
    }

    /// Drop every neighbor for which `keep` returns `false`.
    pub fn retain_neighbors(&mut self, keep: impl FnMut(&GlobalCoord) -> bool) {
        self.neighbors.retain(keep);
    }

    // -------------------------------------------------------------------
    // Occupancy
    // -------------------------------------------------------------------

    /// The agent on this tile.
    pub const fn agent(&self) -> Option<Occupant> {
        self.agent
    }

    /// Whether nothing can be placed here.
    pub const fn is_blocked(&self) -> bool {
        self.solid || self.agent.is_some()
    }

    /// Whether the tile carries anything a zone reload would lose: an
    /// agent, items, solid terrain, or attached behaviors.
    pub fn holds_state(&self) -> bool {
        self.agent.is_some() || self.solid || !self.items.is_empty() || !self.behaviors.is_empty()
    }

    /// Whether the terrain is impassable.
    pub const fn is_solid(&self) -> bool {
        self.solid
    }

    /// Mark the terrain as impassable or not.
    pub const fn set_solid(&mut self, solid: bool) {
        self.solid = solid;
    }

    /// Put an agent on the tile.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TileOccupied`] if another agent is already here.
    pub fn place_agent(&mut self, occupant: Occupant) -> Result<(), WorldError> {
        match self.agent {
            Some(current) if current.actor != occupant.actor => Err(WorldError::TileOccupied {
                tile: self.global,
                occupant: current.actor,
            }),
            _ => {
                self.agent = Some(occupant);
                Ok(())
            }
        }
    }

    /// Remove and return whatever agent is here.
    pub const fn take_agent(&mut self) -> Option<Occupant> {
        self.agent.take()
    }

    /// Items lying on the tile.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Drop an item on the tile.
    pub fn add_item(&mut self, item: ItemId) {
        self.items.push(item);
    }

    /// Pick an item up. Returns `false` if it was not here.
    pub fn remove_item(&mut self, item: ItemId) -> bool {
        match self.items.iter().position(|i| *i == item) {
            Some(idx) => {
                self.items.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------
    // Behaviors and commands
    // -------------------------------------------------------------------

    /// Attach a behavior.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateBehavior`] if a behavior of the same
    /// kind is already attached.
    pub fn attach(&mut self, behavior: Box<dyn TileBehavior>) -> Result<(), WorldError> {
        let kind = behavior.kind();
        if self.behaviors.contains_key(&kind) {
            return Err(WorldError::DuplicateBehavior {
                tile: self.global,
                kind,
            });
        }
        self.behaviors.insert(kind, behavior);
        Ok(())
    }

    /// Detach and return a behavior.
    pub fn detach(&mut self, kind: BehaviorKind) -> Option<Box<dyn TileBehavior>> {
        self.behaviors.remove(&kind)
    }

    /// Look up an attached behavior.
    pub fn behavior(&self, kind: BehaviorKind) -> Option<&dyn TileBehavior> {
        self.behaviors.get(&kind).map(AsRef::as_ref)
    }

    /// A sender for this tile's command queue.
    pub fn command_sender(&self) -> TileCommandSender {
        TileCommandSender {
            tile: self.global,
            tx: self.command_tx.clone(),
        }
    }

    /// Number of commands waiting to run.
    pub fn pending_commands(&self) -> usize {
        self.command_rx.len()
    }

    // -------------------------------------------------------------------
    // Tick fan-out
    // -------------------------------------------------------------------

    /// Full-rate tick for a Hot tile.
    ///
    /// Fast ticks drain the command queue first; then every behavior that
    /// asked for `rate` is ticked.
    pub fn on_tick(&mut self, rate: TickRate) {
        if rate == TickRate::Fast {
            self.drain_commands();
        }
        self.tick_behaviors(rate);
    }

    /// Reduced-rate tick for a Warm tile.
    ///
    /// Fast ticks only drain the command queue; Fast-rate behaviors sleep
    /// until the tile is promoted again.
    pub fn on_warm_tick(&mut self, rate: TickRate) {
        if rate == TickRate::Fast {
            self.drain_commands();
        } else {
            self.tick_behaviors(rate);
        }
    }

    /// Run the commands queued so far. Commands enqueued while draining
    /// wait for the next Fast tick.
    fn drain_commands(&mut self) -> usize {
        let pending = self.command_rx.len();
        let mut ran: usize = 0;
        for _ in 0..pending {
            let Ok(command) = self.command_rx.try_recv() else {
                break;
            };
            command(self);
            ran = ran.saturating_add(1);
        }
        ran
    }

    fn tick_behaviors(&mut self, rate: TickRate) {
        let mut ctx = TileContext {
            coord: self.global,
            state: self.state,
            agent: self.agent,
            items: &mut self.items,
        };
        for behavior in self.behaviors.values_mut() {
            if behavior.tick_rate() == Some(rate) {
                behavior.on_tick(&mut ctx, rate);
            }
        }
    }

    fn for_each_behavior(&mut self, mut hook: impl FnMut(&mut dyn TileBehavior, &mut TileContext<'_>)) {
        let mut ctx = TileContext {
            coord: self.global,
            state: self.state,
            agent: self.agent,
            items: &mut self.items,
        };
        for behavior in self.behaviors.values_mut() {
            hook(behavior.as_mut(), &mut ctx);
        }
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    const fn transition(&self, to: LoadState) -> Transition {
        Transition {
            tile: self.global,
            from: self.state,
            to,
        }
    }

    const fn invalid(&self, to: LoadState) -> WorldError {
        WorldError::InvalidTransition {
            tile: self.global,
            from: self.state,
            to,
        }
    }

    /// Cold -> Warm. Behaviors receive the catch-up window since the tile
    /// last went Cold.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTransition`] unless the tile is Cold.
    pub fn on_warm_load(&mut self, now: &TickStamp) -> Result<Transition, WorldError> {
        if self.state != LoadState::Cold {
            return Err(self.invalid(LoadState::Warm));
        }
        let transition = self.transition(LoadState::Warm);
        self.state = LoadState::Warm;
        let missed = now.since(&self.cold_since);
        self.for_each_behavior(|behavior, ctx| behavior.on_catch_up(ctx, &missed));
        Ok(transition)
    }

    /// Warm -> Hot.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTransition`] unless the tile is Warm.
    pub fn on_hot_load(&mut self) -> Result<Transition, WorldError> {
        if self.state != LoadState::Warm {
            return Err(self.invalid(LoadState::Hot));
        }
        let transition = self.transition(LoadState::Hot);
        self.state = LoadState::Hot;
        self.for_each_behavior(|behavior, ctx| behavior.on_hot_load(ctx));
        Ok(transition)
    }

    /// Hot -> Warm.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTransition`] unless the tile is Hot.
    pub fn on_warm_unload(&mut self) -> Result<Transition, WorldError> {
        if self.state != LoadState::Hot {
            return Err(self.invalid(LoadState::Warm));
        }
        let transition = self.transition(LoadState::Warm);
        self.state = LoadState::Warm;
        self.for_each_behavior(|behavior, ctx| behavior.on_warm_unload(ctx));
        Ok(transition)
    }

    /// Warm or Hot -> Cold. Clears the agent, discards queued commands,
    /// and stamps the time so the next warm-up can catch up.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidTransition`] if the tile is already Cold.
    pub fn on_cold_unload(&mut self, now: &TickStamp) -> Result<ColdUnload, WorldError> {
        if self.state == LoadState::Cold {
            return Err(self.invalid(LoadState::Cold));
        }
        let transition = self.transition(LoadState::Cold);
        self.for_each_behavior(|behavior, ctx| behavior.on_cold_unload(ctx));
        self.state = LoadState::Cold;
        let evicted = self.agent.take();
        let discarded_commands = self.command_rx.try_iter().count();
        self.cold_since = *now;
        Ok(ColdUnload {
            transition,
            evicted,
            discarded_commands,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tessera_types::ActorId;

    use super::*;
    use crate::behavior::Regeneration;
    use crate::catch_up::CatchUp;

    fn make_tile() -> Tile {
        Tile::new(
            LocalCoord::new(1, 1),
            GlobalCoord::new(1, 1),
            ZoneCoord::new(0, 0),
            TickStamp::zero(),
        )
    }

    fn occupant() -> Occupant {
        Occupant {
            actor: ActorId::new(),
            zone_activator: false,
        }
    }

    /// Records every hook invocation in order.
    #[derive(Debug)]
    struct Recorder {
        rate: Option<TickRate>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl TileBehavior for Recorder {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind("recorder")
        }
        fn tick_rate(&self) -> Option<TickRate> {
            self.rate
        }
        fn on_tick(&mut self, _ctx: &mut TileContext<'_>, rate: TickRate) {
            self.log.lock().push(format!("tick:{rate}"));
        }
        fn on_catch_up(&mut self, _ctx: &mut TileContext<'_>, missed: &CatchUp) {
            self.log.lock().push(format!("catch_up:{}", missed.missed_fast));
        }
        fn on_hot_load(&mut self, _ctx: &mut TileContext<'_>) {
            self.log.lock().push("hot_load".to_owned());
        }
        fn on_warm_unload(&mut self, _ctx: &mut TileContext<'_>) {
            self.log.lock().push("warm_unload".to_owned());
        }
        fn on_cold_unload(&mut self, _ctx: &mut TileContext<'_>) {
            self.log.lock().push("cold_unload".to_owned());
        }
    }

    #[test]
    fn neighbors_reject_self_and_duplicates() {
        let mut tile = make_tile();
        assert!(!tile.add_neighbor(GlobalCoord::new(1, 1)));
        assert!(tile.add_neighbor(GlobalCoord::new(0, 0)));
        assert!(!tile.add_neighbor(GlobalCoord::new(0, 0)));
        assert_eq!(tile.neighbors(), &[GlobalCoord::new(0, 0)]);
    }

    #[test]
    fn second_agent_is_rejected() {
        let mut tile = make_tile();
        let first = occupant();
        tile.place_agent(first).unwrap();
        let err = tile.place_agent(occupant()).unwrap_err();
        assert!(matches!(err, WorldError::TileOccupied { occupant, .. } if occupant == first.actor));
        // Re-placing the same agent is idempotent.
        assert!(tile.place_agent(first).is_ok());
        assert!(tile.is_blocked());
    }

    #[test]
    fn solid_tiles_are_blocked() {
        let mut tile = make_tile();
        assert!(!tile.is_blocked());
        tile.set_solid(true);
        assert!(tile.is_blocked());
    }

    #[test]
    fn duplicate_behavior_is_an_error() {
        let mut tile = make_tile();
        tile.attach(Box::new(Regeneration::new(TickRate::Slow, 1, 5)))
            .unwrap();
        let err = tile
            .attach(Box::new(Regeneration::new(TickRate::Fast, 1, 5)))
            .unwrap_err();
        assert!(matches!(err, WorldError::DuplicateBehavior { .. }));
    }

    #[test]
    fn behaviors_can_be_looked_up_and_detached() {
        let mut tile = make_tile();
        tile.attach(Box::new(Regeneration::new(TickRate::Slow, 1, 5)))
            .unwrap();
        let found = tile.behavior(Regeneration::KIND).unwrap();
        assert_eq!(found.tick_rate(), Some(TickRate::Slow));
        assert!(tile.behavior(BehaviorKind("recorder")).is_none());

        let detached = tile.detach(Regeneration::KIND).unwrap();
        assert_eq!(detached.kind(), Regeneration::KIND);
        assert!(tile.behavior(Regeneration::KIND).is_none());
        assert!(tile.detach(Regeneration::KIND).is_none());
        // The kind is free again.
        tile.attach(detached).unwrap();
    }

    #[test]
    fn items_are_removed_by_id() {
        let mut tile = make_tile();
        let (a, b) = (ItemId::new(), ItemId::new());
        tile.add_item(a);
        tile.add_item(b);
        assert!(tile.remove_item(a));
        assert!(!tile.remove_item(a));
        assert_eq!(tile.items(), &[b]);
    }

    #[test]
    fn holds_state_tracks_what_a_reload_would_drop() {
        let mut tile = make_tile();
        assert!(!tile.holds_state());

        let item = ItemId::new();
        tile.add_item(item);
        assert!(tile.holds_state());
        tile.remove_item(item);

        tile.set_solid(true);
        assert!(tile.holds_state());
        tile.set_solid(false);

        tile.attach(Box::new(Regeneration::new(TickRate::Slow, 1, 5)))
            .unwrap();
        assert!(tile.holds_state());
        tile.detach(Regeneration::KIND);

        let agent = occupant();
        tile.place_agent(agent).unwrap();
        assert!(tile.holds_state());
        tile.take_agent();
        assert!(!tile.holds_state());
    }

    #[test]
    fn lifecycle_follows_legal_edges_only() {
        let mut tile = make_tile();
        let now = TickStamp::zero();
        assert!(tile.on_hot_load().is_err());
        assert!(tile.on_cold_unload(&now).is_err());

        let t = tile.on_warm_load(&now).unwrap();
        assert_eq!((t.from, t.to), (LoadState::Cold, LoadState::Warm));
        assert!(tile.on_warm_load(&now).is_err());

        let t = tile.on_hot_load().unwrap();
        assert_eq!((t.from, t.to), (LoadState::Warm, LoadState::Hot));

        let t = tile.on_warm_unload().unwrap();
        assert_eq!((t.from, t.to), (LoadState::Hot, LoadState::Warm));

        let unload = tile.on_cold_unload(&now).unwrap();
        assert_eq!(unload.transition.to, LoadState::Cold);
        assert_eq!(tile.state(), LoadState::Cold);
    }

    #[test]
    fn cold_unload_clears_agent_and_discards_commands() {
        let mut tile = make_tile();
        let now = TickStamp::zero();
        tile.on_warm_load(&now).unwrap();
        let agent = occupant();
        tile.place_agent(agent).unwrap();
        let sender = tile.command_sender();
        assert!(sender.send(|t| t.set_solid(true)));
        assert!(sender.send(|t| t.set_solid(true)));

        let unload = tile.on_cold_unload(&now).unwrap();
        assert_eq!(unload.evicted, Some(agent));
        assert_eq!(unload.discarded_commands, 2);
        assert_eq!(tile.agent(), None);
        assert_eq!(tile.pending_commands(), 0);
        assert!(!tile.is_solid());
    }

    #[test]
    fn commands_run_on_fast_tick_only() {
        let mut tile = make_tile();
        tile.on_warm_load(&TickStamp::zero()).unwrap();
        tile.on_hot_load().unwrap();
        let item = ItemId::new();
        assert!(tile.command_sender().send(move |t| t.add_item(item)));

        tile.on_tick(TickRate::Normal);
        assert!(tile.items().is_empty());
        tile.on_tick(TickRate::Fast);
        assert_eq!(tile.items(), &[item]);
    }

    #[test]
    fn commands_enqueued_while_draining_wait_for_next_tick() {
        let mut tile = make_tile();
        let sender = tile.command_sender();
        let again = sender.clone();
        assert!(sender.send(move |_t| {
            let _ = again.send(|t| t.set_solid(true));
        }));
        tile.on_tick(TickRate::Fast);
        assert!(!tile.is_solid());
        assert_eq!(tile.pending_commands(), 1);
        tile.on_tick(TickRate::Fast);
        assert!(tile.is_solid());
    }

    #[test]
    fn warm_tiles_skip_fast_behaviors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tile = make_tile();
        tile.attach(Box::new(Recorder {
            rate: Some(TickRate::Fast),
            log: Arc::clone(&log),
        }))
        .unwrap();
        tile.on_warm_load(&TickStamp::zero()).unwrap();
        log.lock().clear();

        tile.on_warm_tick(TickRate::Fast);
        assert!(log.lock().is_empty());
        tile.on_tick(TickRate::Fast);
        assert_eq!(log.lock().as_slice(), &["tick:fast".to_owned()]);
    }

    #[test]
    fn warm_load_reports_missed_ticks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let start = TickStamp::zero();
        let mut tile = Tile::new(
            LocalCoord::new(0, 0),
            GlobalCoord::new(0, 0),
            ZoneCoord::new(0, 0),
            start,
        );
        tile.attach(Box::new(Recorder {
            rate: None,
            log: Arc::clone(&log),
        }))
        .unwrap();
        let later = TickStamp {
            at: start.at + Duration::from_secs(1),
            fast: 20,
            normal: 4,
            slow: 1,
        };
        tile.on_warm_load(&later).unwrap();
        tile.on_hot_load().unwrap();
        tile.on_warm_unload().unwrap();
        tile.on_cold_unload(&later).unwrap();
        assert_eq!(
            log.lock().as_slice(),
            &[
                "catch_up:20".to_owned(),
                "hot_load".to_owned(),
                "warm_unload".to_owned(),
                "cold_unload".to_owned(),
            ]
        );
    }
}
