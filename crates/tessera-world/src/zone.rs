//! Zones: fixed-size grids of tiles.
//!
//! A [`Zone`] always exists in the world grid, but its tiles only exist
//! while it is loaded. Loading builds every tile Cold and wires the
//! neighbor links that stay inside the zone; links that cross into an
//! adjacent zone are stitched by the world once both sides are loaded.

use tessera_types::{GlobalCoord, LoadState, LocalCoord, ZoneCoord};
use tracing::debug;

use crate::catch_up::TickStamp;
use crate::error::WorldError;
use crate::tile::Tile;

/// The eight king-move offsets, row by row.
pub(crate) const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A fixed-size grid of tiles.
#[derive(Debug)]
pub struct Zone {
    /// Human-readable name.
    name: String,
    /// Position in the zone grid.
    coord: ZoneCoord,
    /// Global coordinate of local tile (0, 0).
    origin: GlobalCoord,
    /// Tiles along x.
    width: usize,
    /// Tiles along z.
    depth: usize,
    /// Row-major tiles; empty while unloaded.
    tiles: Vec<Tile>,
    /// Adjacent zones, set once by the world.
    neighbors: Vec<ZoneCoord>,
}

impl Zone {
    /// Create an unloaded zone.
    pub fn new(
        name: impl Into<String>,
        coord: ZoneCoord,
        origin: GlobalCoord,
        width: usize,
        depth: usize,
    ) -> Self {
        Self {
            name: name.into(),
            coord,
            origin,
            width,
            depth,
            tiles: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    /// Zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the zone grid.
    pub const fn coord(&self) -> ZoneCoord {
        self.coord
    }

    /// Global coordinate of the zone's first tile.
    pub const fn origin(&self) -> GlobalCoord {
        self.origin
    }

    /// Tiles along x and z.
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.width, self.depth)
    }

    /// Whether tiles currently exist.
    pub fn is_loaded(&self) -> bool {
        !self.tiles.is_empty()
    }

    /// Adjacent zones.
    pub fn neighbors(&self) -> &[ZoneCoord] {
        &self.neighbors
    }

    /// Set the adjacent zones. Only the first call has any effect.
    pub fn set_neighbors(&mut self, neighbors: Vec<ZoneCoord>) {
        if self.neighbors.is_empty() {
            self.neighbors = neighbors;
        }
    }

    /// Whether any zone-activator agent stands in this zone.
    pub fn is_active(&self) -> bool {
        self.tiles
            .iter()
            .any(|tile| tile.agent().is_some_and(|agent| agent.zone_activator))
    }

    /// Whether unloading would lose nothing: every tile is Cold and none
    /// holds an agent, items, solid terrain, or behaviors.
    pub fn is_idle(&self) -> bool {
        self.tiles
            .iter()
            .all(|tile| tile.state() == LoadState::Cold && !tile.holds_state())
    }

    /// Number of agents standing in this zone.
    pub fn agent_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.agent().is_some()).count()
    }

    fn index(&self, local: LocalCoord) -> Option<usize> {
        if local.x >= self.width || local.z >= self.depth {
            return None;
        }
        local.z.checked_mul(self.width)?.checked_add(local.x)
    }

    fn global_of(&self, local: LocalCoord) -> Result<GlobalCoord, WorldError> {
        let dx = i32::try_from(local.x).map_err(|_err| WorldError::ArithmeticOverflow)?;
        let dz = i32::try_from(local.z).map_err(|_err| WorldError::ArithmeticOverflow)?;
        self.origin
            .offset(dx, dz)
            .ok_or(WorldError::ArithmeticOverflow)
    }

    /// Look up a tile by local coordinate.
    pub fn tile(&self, local: LocalCoord) -> Option<&Tile> {
        self.tiles.get(self.index(local)?)
    }

    /// Look up a tile mutably by local coordinate.
    pub fn tile_mut(&mut self, local: LocalCoord) -> Option<&mut Tile> {
        let idx = self.index(local)?;
        self.tiles.get_mut(idx)
    }

    /// Iterate over loaded tiles.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Iterate over loaded tiles mutably.
    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// Build the tiles and wire intra-zone neighbors. No-op if loaded.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ArithmeticOverflow`] if a tile's global
    /// coordinate does not fit.
    pub fn on_load(&mut self, stamp: &TickStamp) -> Result<(), WorldError> {
        if self.is_loaded() {
            return Ok(());
        }
        let count = self
            .width
            .checked_mul(self.depth)
            .ok_or(WorldError::ArithmeticOverflow)?;
        let mut tiles = Vec::with_capacity(count);
        for z in 0..self.depth {
            for x in 0..self.width {
                let local = LocalCoord::new(x, z);
                tiles.push(Tile::new(local, self.global_of(local)?, self.coord, *stamp));
            }
        }
        self.tiles = tiles;
        self.wire_interior();
        debug!(zone = %self.coord, name = %self.name, tiles = count, "Zone loaded");
        Ok(())
    }

    /// Destroy every tile. Returns how many were dropped.
    pub fn on_unload(&mut self) -> usize {
        let dropped = self.tiles.len();
        self.tiles = Vec::new();
        debug!(zone = %self.coord, name = %self.name, tiles = dropped, "Zone unloaded");
        dropped
    }

    fn wire_interior(&mut self) {
        let (width, depth) = (self.width, self.depth);
        for tile in &mut self.tiles {
            let local = tile.local();
            let global = tile.global();
            for (dx, dz) in NEIGHBOR_OFFSETS {
                let (Some(nx), Some(nz)) = (
                    local.x.checked_add_signed(isize::try_from(dx).unwrap_or(0)),
                    local.z.checked_add_signed(isize::try_from(dz).unwrap_or(0)),
                ) else {
                    continue;
                };
                if nx >= width || nz >= depth {
                    continue;
                }
                if let Some(neighbor) = global.offset(dx, dz) {
                    tile.add_neighbor(neighbor);
                }
            }
        }
    }
}
