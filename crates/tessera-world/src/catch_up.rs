//! Tick stamps and the catch-up window handed to behaviors.
//!
//! When a tile goes Cold it remembers a [`TickStamp`]. When it later
//! warms up again, the difference between that stamp and the current one
//! is the [`CatchUp`] window: how much wall time passed and how many ticks
//! of each rate the tile did not see. Behaviors use it to settle the owed
//! simulation in one step instead of silently skipping it.

use std::time::{Duration, Instant};

use tessera_types::TickRate;

/// Point-in-time reading of the tick counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStamp {
    /// Wall-clock instant of the reading.
    pub at: Instant,
    /// Fast ticks fired so far.
    pub fast: u64,
    /// Normal ticks fired so far.
    pub normal: u64,
    /// Slow ticks fired so far.
    pub slow: u64,
}

impl TickStamp {
    /// A stamp taken now with all counters at zero.
    pub fn zero() -> Self {
        Self {
            at: Instant::now(),
            fast: 0,
            normal: 0,
            slow: 0,
        }
    }

    /// Counter value for one rate.
    pub const fn count(&self, rate: TickRate) -> u64 {
        match rate {
            TickRate::Fast => self.fast,
            TickRate::Normal => self.normal,
            TickRate::Slow => self.slow,
        }
    }

    /// The window between an earlier stamp and this one.
    ///
    /// Saturates at zero if `earlier` is actually later, so a stamp taken
    /// from a restarted counter never produces a huge bogus window.
    pub fn since(&self, earlier: &Self) -> CatchUp {
        CatchUp {
            elapsed: self.at.saturating_duration_since(earlier.at),
            missed_fast: self.fast.saturating_sub(earlier.fast),
            missed_normal: self.normal.saturating_sub(earlier.normal),
            missed_slow: self.slow.saturating_sub(earlier.slow),
        }
    }
}

/// Simulation a tile missed while it was Cold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUp {
    /// Wall time spent Cold.
    pub elapsed: Duration,
    /// Fast ticks missed.
    pub missed_fast: u64,
    /// Normal ticks missed.
    pub missed_normal: u64,
    /// Slow ticks missed.
    pub missed_slow: u64,
}

impl CatchUp {
    /// Missed ticks of one rate.
    pub const fn missed(&self, rate: TickRate) -> u64 {
        match rate {
            TickRate::Fast => self.missed_fast,
            TickRate::Normal => self.missed_normal,
            TickRate::Slow => self.missed_slow,
        }
    }

    /// Whether anything was missed at all.
    pub const fn is_empty(&self) -> bool {
        self.missed_fast == 0 && self.missed_normal == 0 && self.missed_slow == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_counts_missed_ticks_per_rate() {
        let start = TickStamp::zero();
        let later = TickStamp {
            at: start.at + Duration::from_millis(900),
            fast: 18,
            normal: 3,
            slow: 0,
        };
        let window = later.since(&start);
        assert_eq!(window.elapsed, Duration::from_millis(900));
        assert_eq!(window.missed(TickRate::Fast), 18);
        assert_eq!(window.missed(TickRate::Normal), 3);
        assert_eq!(window.missed(TickRate::Slow), 0);
        assert!(!window.is_empty());
    }

    #[test]
    fn reversed_window_saturates() {
        let later = TickStamp {
            at: Instant::now(),
            fast: 10,
            normal: 10,
            slow: 10,
        };
        let earlier = TickStamp::zero();
        assert!(earlier.since(&later).is_empty());
    }
}
