//! Shared type definitions for the Tessera world server.
//!
//! This crate holds the vocabulary every other crate in the workspace
//! speaks: identifiers, the three coordinate spaces, tick rates, tile
//! load states, and the notification payloads handed to the network
//! bridge.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for actors and items
//! - [`coords`] -- Global, zone, and zone-local coordinates
//! - [`enums`] -- [`TickRate`] and [`LoadState`]
//! - [`notifications`] -- Tile state and actor view change payloads

pub mod coords;
pub mod enums;
pub mod ids;
pub mod notifications;

// Re-export all public types at crate root for convenience.
pub use coords::{GlobalCoord, LocalCoord, ZoneCoord};
pub use enums::{LoadState, TickRate};
pub use ids::{ActorId, ItemId, ParseIdError};
pub use notifications::{ActorViewChange, Notification, TileStateChange};
