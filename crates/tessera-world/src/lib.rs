//! Tiles, zones, and world addressing for the Tessera world server.
//!
//! This crate models the spatial graph the simulation runs on: a fixed
//! grid of zones, each a fixed grid of tiles, with eight-way neighbor
//! links inside and across zone borders. It knows nothing about ticks or
//! threads; the core crate drives it from a single tick thread.
//!
//! # Modules
//!
//! - [`actor`] -- [`Actor`] handles with capability flags and position.
//! - [`behavior`] -- [`TileBehavior`] trait and the [`Regeneration`]
//!   behavior.
//! - [`catch_up`] -- [`TickStamp`] and the [`CatchUp`] window.
//! - [`error`] -- Error types for world operations.
//! - [`tile`] -- [`Tile`] occupancy, command queue, and lifecycle.
//! - [`world`] -- [`World`] grid, addressing, lazy loading, stitching.
//! - [`zone`] -- [`Zone`] tile grid and intra-zone wiring.

pub mod actor;
pub mod behavior;
pub mod catch_up;
pub mod error;
pub mod tile;
pub mod world;
pub mod zone;

// Re-export primary types at crate root.
pub use actor::{Actor, ActorRef, Occupant};
pub use behavior::{BehaviorKind, Regeneration, TileBehavior, TileContext};
pub use catch_up::{CatchUp, TickStamp};
pub use error::WorldError;
pub use tile::{ColdUnload, Tile, TileCommand, TileCommandSender, Transition};
pub use world::{TileAddress, World, WorldDimensions};
pub use zone::Zone;
