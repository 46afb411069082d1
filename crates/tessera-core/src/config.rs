//! Configuration loading and typed config structures for the world server.
//!
//! The canonical configuration lives in `tessera-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads the file through a [`FileService`] and
//! validates the result. Every field has a default, so a missing file or a
//! partial file is always usable.
//!
//! [`FileService`]: crate::files::FileService

use serde::Deserialize;
use tessera_world::WorldDimensions;

use crate::files::{FileError, FileService};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file service failed to read the configuration.
    #[error("failed to read config file: {source}")]
    File {
        /// The underlying file service error.
        #[from]
        source: FileError,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of its legal range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// World shape.
    #[serde(default)]
    pub world: WorldConfig,

    /// Tick intervals.
    #[serde(default)]
    pub ticks: TickConfig,

    /// Working-set radii.
    #[serde(default)]
    pub composer: ComposerConfig,

    /// Request queue policy.
    #[serde(default)]
    pub director: DirectorConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load configuration through a file service.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::File`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn load(files: &dyn FileService, path: &str) -> Result<Self, ConfigError> {
        match files.read_text(path)? {
            Some(contents) => Self::parse(&contents),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            reason: reason.to_owned(),
        };
        if self.ticks.fast_interval_ms == 0
            || self.ticks.normal_interval_ms == 0
            || self.ticks.slow_interval_ms == 0
        {
            return Err(invalid("tick intervals must be at least 1ms"));
        }
        if self.world.zones_x == 0
            || self.world.zones_z == 0
            || self.world.zone_width == 0
            || self.world.zone_depth == 0
        {
            return Err(invalid("world and zone dimensions must be at least 1"));
        }
        let mult = self.composer.warm_radius_multiplier;
        if !mult.is_finite() || mult < 0.0 {
            return Err(invalid("warm_radius_multiplier must be a finite, non-negative number"));
        }
        Ok(())
    }
}

/// World shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// World name, used as the zone name prefix.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Zones along x.
    #[serde(default = "default_zones")]
    pub zones_x: usize,

    /// Zones along z.
    #[serde(default = "default_zones")]
    pub zones_z: usize,

    /// Tiles per zone along x.
    #[serde(default = "default_zone_size")]
    pub zone_width: usize,

    /// Tiles per zone along z.
    #[serde(default = "default_zone_size")]
    pub zone_depth: usize,
}

impl WorldConfig {
    /// The grid shape as the world crate expects it.
    pub const fn dimensions(&self) -> WorldDimensions {
        WorldDimensions {
            zones_x: self.zones_x,
            zones_z: self.zones_z,
            zone_width: self.zone_width,
            zone_depth: self.zone_depth,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            zones_x: default_zones(),
            zones_z: default_zones(),
            zone_width: default_zone_size(),
            zone_depth: default_zone_size(),
        }
    }
}

/// Tick intervals in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Fast tick interval.
    #[serde(default = "default_fast_interval_ms")]
    pub fast_interval_ms: u64,

    /// Normal tick interval.
    #[serde(default = "default_normal_interval_ms")]
    pub normal_interval_ms: u64,

    /// Slow tick interval.
    #[serde(default = "default_slow_interval_ms")]
    pub slow_interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: default_fast_interval_ms(),
            normal_interval_ms: default_normal_interval_ms(),
            slow_interval_ms: default_slow_interval_ms(),
        }
    }
}

/// Working-set radii.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComposerConfig {
    /// Radius in tiles within which tiles are Hot.
    #[serde(default = "default_hot_radius")]
    pub hot_radius: u32,

    /// Warm radius as a multiple of the hot radius.
    #[serde(default = "default_warm_radius_multiplier")]
    pub warm_radius_multiplier: f64,

    /// Unload zones with no live tiles and no activator after a refresh.
    #[serde(default = "default_true")]
    pub unload_idle_zones: bool,
}

impl ComposerConfig {
    /// `round(hot_radius * warm_radius_multiplier)`, never below the hot
    /// radius.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn warm_radius(&self) -> u32 {
        let scaled = (f64::from(self.hot_radius) * self.warm_radius_multiplier).round();
        let warm = if scaled.is_finite() && scaled >= 0.0 {
            scaled.min(f64::from(u32::MAX)) as u32
        } else {
            self.hot_radius
        };
        warm.max(self.hot_radius)
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            hot_radius: default_hot_radius(),
            warm_radius_multiplier: default_warm_radius_multiplier(),
            unload_idle_zones: true,
        }
    }
}

/// Request queue policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DirectorConfig {
    /// Default ring radius searched around a blocked spawn tile.
    #[serde(default = "default_spawn_search_radius")]
    pub spawn_search_radius: u32,

    /// Fast ticks a spawn may be requeued before it resolves to nothing.
    #[serde(default = "default_spawn_retry_limit")]
    pub spawn_retry_limit: u32,

    /// How long `stop` waits for the tick loop to exit.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            spawn_search_radius: default_spawn_search_radius(),
            spawn_retry_limit: default_spawn_retry_limit(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "tessera".to_owned()
}

const fn default_zones() -> usize {
    4
}

const fn default_zone_size() -> usize {
    128
}

const fn default_fast_interval_ms() -> u64 {
    50
}

const fn default_normal_interval_ms() -> u64 {
    250
}

const fn default_slow_interval_ms() -> u64 {
    1000
}

const fn default_hot_radius() -> u32 {
    8
}

const fn default_warm_radius_multiplier() -> f64 {
    1.5
}

const fn default_true() -> bool {
    true
}

const fn default_spawn_search_radius() -> u32 {
    4
}

const fn default_spawn_retry_limit() -> u32 {
    200
}

const fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_owned()
}
