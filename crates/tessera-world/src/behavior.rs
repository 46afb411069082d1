//! Per-tile behaviors and the hooks the tick fan-out calls on them.
//!
//! A behavior is attached to a tile under a [`BehaviorKind`]; a tile holds
//! at most one behavior of each kind. Each behavior declares the one tick
//! rate it wants (or none) and receives lifecycle hooks as its tile moves
//! between load states.
//!
//! Behaviors never hold a pointer back to their tile. Instead every hook
//! receives a [`TileContext`] describing the owning tile for the duration
//! of the call.

use tessera_types::{GlobalCoord, ItemId, LoadState, TickRate};

use crate::actor::Occupant;
use crate::catch_up::CatchUp;

/// Name of a behavior type. One per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BehaviorKind(pub &'static str);

impl core::fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

/// The owning tile as seen by a behavior hook.
#[derive(Debug)]
pub struct TileContext<'a> {
    /// Global coordinate of the tile.
    pub coord: GlobalCoord,
    /// Load state at the time of the call.
    pub state: LoadState,
    /// The agent on the tile, if any.
    pub agent: Option<Occupant>,
    /// Items lying on the tile. Behaviors may add or remove items.
    pub items: &'a mut Vec<ItemId>,
}

/// Logic attached to a tile.
///
/// Only `kind`, `tick_rate`, and `on_tick` are required; the lifecycle
/// hooks default to doing nothing.
pub trait TileBehavior: Send + core::fmt::Debug {
    /// The kind this behavior is registered under.
    fn kind(&self) -> BehaviorKind;

    /// The rate at which this behavior wants `on_tick`, or `None`.
    fn tick_rate(&self) -> Option<TickRate>;

    /// Called once per tick of the declared rate while the tile is live.
    fn on_tick(&mut self, ctx: &mut TileContext<'_>, rate: TickRate);

    /// Called when the tile warms up from Cold, with what it missed.
    fn on_catch_up(&mut self, _ctx: &mut TileContext<'_>, _missed: &CatchUp) {}

    /// Called when the tile is promoted from Warm to Hot.
    fn on_hot_load(&mut self, _ctx: &mut TileContext<'_>) {}

    /// Called when the tile is demoted from Hot to Warm.
    fn on_warm_unload(&mut self, _ctx: &mut TileContext<'_>) {}

    /// Called when the tile goes Cold.
    fn on_cold_unload(&mut self, _ctx: &mut TileContext<'_>) {}
}

/// A stock that refills by a fixed amount per tick up to a ceiling.
///
/// On catch-up the whole owed amount is credited at once, so a berry bush
/// nobody looked at for ten minutes is just as full as one that was
/// simulated the entire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regeneration {
    /// Rate at which the stock refills.
    pub rate: TickRate,
    /// Units added per tick.
    pub per_tick: u32,
    /// Current stock.
    pub available: u32,
    /// Ceiling for `available`.
    pub capacity: u32,
}

impl Regeneration {
    /// Kind under which regeneration is registered.
    pub const KIND: BehaviorKind = BehaviorKind("regeneration");

    /// Create an empty stock.
    pub const fn new(rate: TickRate, per_tick: u32, capacity: u32) -> Self {
        Self {
            rate,
            per_tick,
            available: 0,
            capacity,
        }
    }

    /// Credit `ticks` worth of regeneration, capped at capacity.
    ///
    /// Returns the units actually added.
    pub fn accrue(&mut self, ticks: u64) -> u32 {
        let headroom = self.capacity.saturating_sub(self.available);
        let owed = u64::from(self.per_tick).saturating_mul(ticks);
        let added = u32::try_from(owed).unwrap_or(u32::MAX).min(headroom);
        self.available = self.available.saturating_add(added);
        added
    }

    /// Take up to `requested` units, returning what was taken.
    pub fn harvest(&mut self, requested: u32) -> u32 {
        let taken = requested.min(self.available);
        self.available = self.available.saturating_sub(taken);
        taken
    }
}

impl TileBehavior for Regeneration {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn tick_rate(&self) -> Option<TickRate> {
        Some(self.rate)
    }

    fn on_tick(&mut self, _ctx: &mut TileContext<'_>, _rate: TickRate) {
        self.accrue(1);
    }

    fn on_catch_up(&mut self, _ctx: &mut TileContext<'_>, missed: &CatchUp) {
        self.accrue(missed.missed(self.rate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrue_caps_at_capacity() {
        let mut regen = Regeneration::new(TickRate::Slow, 3, 10);
        assert_eq!(regen.accrue(2), 6);
        assert_eq!(regen.accrue(2), 4);
        assert_eq!(regen.available, 10);
        assert_eq!(regen.accrue(100), 0);
    }

    #[test]
    fn harvest_takes_at_most_available() {
        let mut regen = Regeneration::new(TickRate::Normal, 5, 50);
        regen.accrue(1);
        assert_eq!(regen.harvest(8), 5);
        assert_eq!(regen.available, 0);
    }

    #[test]
    fn catch_up_credits_missed_ticks_of_own_rate() {
        let mut regen = Regeneration::new(TickRate::Normal, 2, 100);
        let mut items = Vec::new();
        let mut ctx = TileContext {
            coord: GlobalCoord::new(0, 0),
            state: LoadState::Warm,
            agent: None,
            items: &mut items,
        };
        let missed = CatchUp {
            missed_fast: 40,
            missed_normal: 7,
            missed_slow: 1,
            ..CatchUp::default()
        };
        regen.on_catch_up(&mut ctx, &missed);
        assert_eq!(regen.available, 14);
    }
}
