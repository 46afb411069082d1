//! Tick scheduling, working-set composition, and orchestration for the
//! Tessera world server.
//!
//! One dedicated thread (the metronome) drives everything that mutates
//! the world. Other threads only enqueue requests through a
//! [`DirectorHandle`] or call the thread-safe [`ActorRegistrar`].
//!
//! # Modules
//!
//! - [`composer`] -- [`WorldComposer`]: Hot/Warm/Cold working set and tile
//!   fan-out.
//! - [`config`] -- Configuration loading from `tessera-config.yaml` into
//!   strongly-typed structs.
//! - [`director`] -- [`Director`] spawn and move queues drained on Fast
//!   ticks.
//! - [`files`] -- [`FileService`] seam for configuration and profile text.
//! - [`metronome`] -- [`Metronome`] tick loop with bounded catch-up.
//! - [`notify`] -- [`NotificationSink`] seam for the network bridge.
//! - [`registrar`] -- [`ActorRegistrar`] map of tracked actors.
//! - [`server`] -- [`WorldServer`] context object that owns it all.

pub mod composer;
pub mod config;
pub mod director;
pub mod files;
pub mod metronome;
pub mod notify;
pub mod registrar;
pub mod server;

// Re-export primary types at crate root.
pub use composer::{RefreshSummary, WorldComposer};
pub use config::{ConfigError, ServerConfig};
pub use director::{Completion, Director, DirectorError, DirectorHandle, DrainSummary};
pub use files::{FileError, FileService, LocalFileService, MemoryFileService};
pub use metronome::{
    MAX_CATCHUP_TICKS, Metronome, MetronomeError, TickAccumulator, TickBurst, TickCounters,
    TickIntervals,
};
pub use notify::{ChannelSink, NotificationSink, NullSink};
pub use registrar::ActorRegistrar;
pub use server::WorldServer;
