//! The world server context.
//!
//! [`WorldServer`] is built once at process start and owns everything
//! that used to be process-wide: configuration, the shared tick counters,
//! the registrar, the director, and the metronome that drives it. Other
//! subsystems receive a [`DirectorHandle`] instead of reaching for a
//! global.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tessera_world::{World, WorldError};
use tracing::info;

use crate::composer::WorldComposer;
use crate::config::ServerConfig;
use crate::director::{Director, DirectorHandle};
use crate::metronome::{Metronome, MetronomeError, TickCounters};
use crate::notify::NotificationSink;
use crate::registrar::ActorRegistrar;

/// Owner of one running world.
#[derive(Debug)]
pub struct WorldServer {
    /// Configuration the server was built from.
    config: ServerConfig,
    /// Tick loop.
    metronome: Metronome,
    /// Tick-thread state. Locked once per tick by the metronome and
    /// otherwise only by [`WorldServer::with_director`].
    director: Arc<Mutex<Director>>,
    /// Handle given out to producers.
    handle: DirectorHandle,
    /// When the metronome was last started.
    started_at: Option<DateTime<Utc>>,
}

impl WorldServer {
    /// Build the world and every subsystem around it. Nothing ticks until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the configured dimensions are unusable.
    pub fn new(config: ServerConfig, sink: Arc<dyn NotificationSink>) -> Result<Self, WorldError> {
        let world = World::new(config.world.name.clone(), config.world.dimensions())?;
        let counters = Arc::new(TickCounters::new(&config.ticks));
        let registrar = Arc::new(ActorRegistrar::new());
        let composer = WorldComposer::new(world, Arc::clone(&counters), sink, &config.composer);
        let director = Director::new(composer, registrar, config.director);
        let handle = director.handle();

        info!(
            world = %config.world.name,
            zones_x = config.world.zones_x,
            zones_z = config.world.zones_z,
            zone_width = config.world.zone_width,
            zone_depth = config.world.zone_depth,
            hot_radius = config.composer.hot_radius,
            warm_radius = config.composer.warm_radius(),
            "World server created"
        );

        Ok(Self {
            config,
            metronome: Metronome::new(counters),
            director: Arc::new(Mutex::new(director)),
            handle,
            started_at: None,
        })
    }

    /// Configuration in force.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A handle for queuing requests from any thread.
    pub fn handle(&self) -> DirectorHandle {
        self.handle.clone()
    }

    /// Shared tick counters.
    pub const fn counters(&self) -> &Arc<TickCounters> {
        self.metronome.counters()
    }

    /// Whether the tick loop is alive.
    pub fn is_running(&self) -> bool {
        self.metronome.is_running()
    }

    /// When the tick loop was last started.
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Run `f` against the tick-thread state. Blocks the tick loop for
    /// its duration.
    pub fn with_director<R>(&self, f: impl FnOnce(&mut Director) -> R) -> R {
        f(&mut self.director.lock())
    }

    /// Start ticking. Returns `Ok(false)` if already running.
    ///
    /// # Errors
    ///
    /// Returns [`MetronomeError::Spawn`] if the loop thread cannot start.
    pub fn start(&mut self) -> Result<bool, MetronomeError> {
        let director = Arc::clone(&self.director);
        let started = self
            .metronome
            .start(&self.config.ticks, move |rate| director.lock().on_tick(rate))?;
        if started {
            self.started_at = Some(Utc::now());
            info!(world = %self.config.world.name, "World server started");
        }
        Ok(started)
    }

    /// Stop ticking, waiting up to the configured timeout.
    ///
    /// # Errors
    ///
    /// Propagates [`Metronome::stop`] errors, including a tick failure
    /// that had already ended the loop.
    pub fn stop(&mut self) -> Result<(), MetronomeError> {
        let timeout = Duration::from_millis(self.config.director.stop_timeout_ms);
        let outcome = self.metronome.stop(timeout);
        if let Some(started_at) = self.started_at.take() {
            let uptime_ms = Utc::now()
                .signed_duration_since(started_at)
                .num_milliseconds();
            info!(world = %self.config.world.name, uptime_ms, "World server stopped");
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tessera_types::{GlobalCoord, TickRate};
    use tessera_world::Actor;

    use super::*;
    use crate::config::TickConfig;
    use crate::notify::NullSink;

    fn fast_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.world.zones_x = 2;
        config.world.zones_z = 2;
        config.world.zone_width = 16;
        config.world.zone_depth = 16;
        config.ticks = TickConfig {
            fast_interval_ms: 2,
            normal_interval_ms: 4,
            slow_interval_ms: 8,
        };
        config.composer.hot_radius = 1;
        config
    }

    #[test]
    fn rejects_empty_world() {
        let mut config = fast_config();
        config.world.zones_x = 0;
        assert!(WorldServer::new(config, Arc::new(NullSink)).is_err());
    }

    #[tokio::test]
    async fn spawn_completes_while_running() {
        let mut server = WorldServer::new(fast_config(), Arc::new(NullSink)).unwrap();
        assert!(server.start().unwrap());
        assert!(!server.start().unwrap());
        assert!(server.started_at().is_some());

        let hero = Actor::new("hero").unique().into_ref();
        let done = server.handle().request_spawn(hero, 6, 6, None);
        let tile = tokio::time::timeout(Duration::from_secs(5), done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tile, Some(GlobalCoord::new(6, 6)));

        server.stop().unwrap();
        assert!(!server.is_running());
        assert!(server.counters().count(TickRate::Fast) >= 1);
        server.with_director(|director| {
            assert_eq!(director.registrar().count(), 1);
            assert_eq!(director.composer().hot().len(), 9);
        });
    }

    #[test]
    fn restart_after_stop() {
        let mut server = WorldServer::new(fast_config(), Arc::new(NullSink)).unwrap();
        assert!(server.start().unwrap());
        server.stop().unwrap();
        assert!(server.start().unwrap());
        server.stop().unwrap();
        // Stopping twice is harmless.
        server.stop().unwrap();
    }
}
