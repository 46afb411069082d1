//! Error types for the `tessera-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`]. Expected
//! runtime conditions (a blocked tile, a coordinate off the map) are
//! reported through `Option`/`bool` returns by the lookup helpers; the
//! variants here are for operations the caller asked to perform and that
//! could not be carried out, plus invariant violations that indicate a
//! construction bug.

use tessera_types::{ActorId, GlobalCoord, LoadState, ZoneCoord};

use crate::behavior::BehaviorKind;

/// Errors that can occur during tile, zone, or world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The coordinate lies outside the world.
    #[error("coordinate {0} is outside the world")]
    OutOfBounds(GlobalCoord),

    /// The zone coordinate lies outside the world's zone grid.
    #[error("{0} is outside the zone grid")]
    ZoneOutOfBounds(ZoneCoord),

    /// The tile already holds an agent.
    #[error("tile {tile} is already occupied by {occupant}")]
    TileOccupied {
        /// The contested tile.
        tile: GlobalCoord,
        /// The agent currently standing there.
        occupant: ActorId,
    },

    /// A lifecycle hook was invoked from a state it does not accept.
    #[error("tile {tile} cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// The tile.
        tile: GlobalCoord,
        /// The state the tile was in.
        from: LoadState,
        /// The state that was requested.
        to: LoadState,
    },

    /// A behavior of the same kind is already attached to the tile.
    #[error("tile {tile} already has a {kind} behavior")]
    DuplicateBehavior {
        /// The tile.
        tile: GlobalCoord,
        /// The duplicated behavior kind.
        kind: BehaviorKind,
    },

    /// A zone was asked to unload while some of its tiles were still live
    /// or occupied.
    #[error("{zone} still has {live} live or occupied tiles")]
    ZoneBusy {
        /// The zone.
        zone: ZoneCoord,
        /// Number of tiles not yet Cold or holding an agent.
        live: usize,
    },

    /// World or zone dimensions are unusable.
    #[error("invalid world dimensions: {reason}")]
    InvalidDimensions {
        /// Explanation of what is wrong with the dimensions.
        reason: String,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
