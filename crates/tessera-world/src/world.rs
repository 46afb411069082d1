//! The world: a fixed grid of zones and global coordinate resolution.
//!
//! Addressing is pure integer arithmetic. For a global coordinate `g`
//! and zone dimensions `(w, d)`:
//!
//! ```text
//! zone  = (g.x / w, g.z / d)
//! local = (g.x % w, g.z % d)
//! ```
//!
//! Negative coordinates and coordinates past the last zone are outside
//! the world. Zones load lazily: [`World::ensure_zone_loaded`] builds the
//! zone's tiles and then stitches its border tiles to every adjacent zone
//! that is already loaded, in both directions.

use tessera_types::{GlobalCoord, LoadState, LocalCoord, ZoneCoord};
use tracing::{debug, info};

use crate::catch_up::TickStamp;
use crate::error::WorldError;
use crate::tile::Tile;
use crate::zone::{NEIGHBOR_OFFSETS, Zone};

/// Shape of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldDimensions {
    /// Zones along x.
    pub zones_x: usize,
    /// Zones along z.
    pub zones_z: usize,
    /// Tiles per zone along x.
    pub zone_width: usize,
    /// Tiles per zone along z.
    pub zone_depth: usize,
}

/// A tile's (zone, local) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileAddress {
    /// The owning zone.
    pub zone: ZoneCoord,
    /// Position inside the zone.
    pub local: LocalCoord,
}

/// A fixed grid of zones.
#[derive(Debug)]
pub struct World {
    /// World name, used as the zone name prefix.
    name: String,
    /// Grid shape.
    dims: WorldDimensions,
    /// Row-major zones.
    zones: Vec<Zone>,
}

impl World {
    /// Create a world with every zone unloaded and zone adjacency wired.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if any dimension is zero
    /// or the world's extent does not fit in a global coordinate.
    pub fn new(name: impl Into<String>, dims: WorldDimensions) -> Result<Self, WorldError> {
        let name = name.into();
        if dims.zones_x == 0 || dims.zones_z == 0 || dims.zone_width == 0 || dims.zone_depth == 0
        {
            return Err(WorldError::InvalidDimensions {
                reason: format!("all dimensions must be at least 1, got {dims:?}"),
            });
        }
        let extent_x = dims.zones_x.checked_mul(dims.zone_width);
        let extent_z = dims.zones_z.checked_mul(dims.zone_depth);
        let fits = |extent: Option<usize>| extent.and_then(|e| i32::try_from(e).ok()).is_some();
        if !fits(extent_x) || !fits(extent_z) {
            return Err(WorldError::InvalidDimensions {
                reason: format!("world extent overflows a global coordinate: {dims:?}"),
            });
        }

        let mut zones = Vec::with_capacity(dims.zones_x.saturating_mul(dims.zones_z));
        for zz in 0..dims.zones_z {
            for zx in 0..dims.zones_x {
                let coord = ZoneCoord::new(zx, zz);
                let origin = Self::origin_of(&dims, coord)?;
                zones.push(Zone::new(
                    format!("{name}:{zx}:{zz}"),
                    coord,
                    origin,
                    dims.zone_width,
                    dims.zone_depth,
                ));
            }
        }

        let mut world = Self { name, dims, zones };
        world.wire_zone_neighbors();
        info!(
            world = world.name,
            zones_x = dims.zones_x,
            zones_z = dims.zones_z,
            zone_width = dims.zone_width,
            zone_depth = dims.zone_depth,
            "World created"
        );
        Ok(world)
    }

    fn origin_of(dims: &WorldDimensions, coord: ZoneCoord) -> Result<GlobalCoord, WorldError> {
        let x = coord
            .x
            .checked_mul(dims.zone_width)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or(WorldError::ArithmeticOverflow)?;
        let z = coord
            .z
            .checked_mul(dims.zone_depth)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or(WorldError::ArithmeticOverflow)?;
        Ok(GlobalCoord::new(x, z))
    }

    fn wire_zone_neighbors(&mut self) {
        let dims = self.dims;
        for zone in &mut self.zones {
            let coord = zone.coord();
            let neighbors = NEIGHBOR_OFFSETS
                .iter()
                .filter_map(|&(dx, dz)| {
                    let x = coord.x.checked_add_signed(isize::try_from(dx).ok()?)?;
                    let z = coord.z.checked_add_signed(isize::try_from(dz).ok()?)?;
                    (x < dims.zones_x && z < dims.zones_z).then_some(ZoneCoord::new(x, z))
                })
                .collect();
            zone.set_neighbors(neighbors);
        }
    }

    /// World name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid shape.
    pub const fn dimensions(&self) -> WorldDimensions {
        self.dims
    }

    // -------------------------------------------------------------------
    // Addressing
    // -------------------------------------------------------------------

    /// Resolve a global coordinate to its (zone, local) address.
    pub fn resolve(&self, global: GlobalCoord) -> Option<TileAddress> {
        let x = usize::try_from(global.x).ok()?;
        let z = usize::try_from(global.z).ok()?;
        let zone = ZoneCoord::new(
            x.checked_div(self.dims.zone_width)?,
            z.checked_div(self.dims.zone_depth)?,
        );
        if zone.x >= self.dims.zones_x || zone.z >= self.dims.zones_z {
            return None;
        }
        let local = LocalCoord::new(
            x.checked_rem(self.dims.zone_width)?,
            z.checked_rem(self.dims.zone_depth)?,
        );
        Some(TileAddress { zone, local })
    }

    /// Turn a (zone, local) address back into a global coordinate.
    pub fn to_global(&self, address: TileAddress) -> Option<GlobalCoord> {
        if address.zone.x >= self.dims.zones_x
            || address.zone.z >= self.dims.zones_z
            || address.local.x >= self.dims.zone_width
            || address.local.z >= self.dims.zone_depth
        {
            return None;
        }
        let origin = Self::origin_of(&self.dims, address.zone).ok()?;
        origin.offset(
            i32::try_from(address.local.x).ok()?,
            i32::try_from(address.local.z).ok()?,
        )
    }

    /// Whether the coordinate lies inside the world.
    pub fn contains(&self, global: GlobalCoord) -> bool {
        self.resolve(global).is_some()
    }

    // -------------------------------------------------------------------
    // Zones
    // -------------------------------------------------------------------

    fn zone_index(&self, coord: ZoneCoord) -> Option<usize> {
        if coord.x >= self.dims.zones_x || coord.z >= self.dims.zones_z {
            return None;
        }
        coord.z.checked_mul(self.dims.zones_x)?.checked_add(coord.x)
    }

    /// Look up a zone.
    pub fn zone(&self, coord: ZoneCoord) -> Option<&Zone> {
        self.zones.get(self.zone_index(coord)?)
    }

    /// Look up a zone mutably.
    pub fn zone_mut(&mut self, coord: ZoneCoord) -> Option<&mut Zone> {
        let idx = self.zone_index(coord)?;
        self.zones.get_mut(idx)
    }

    /// Iterate over every zone.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// Number of zones whose tiles currently exist.
    pub fn loaded_zone_count(&self) -> usize {
        self.zones.iter().filter(|zone| zone.is_loaded()).count()
    }

    /// Load a zone if needed and stitch it to its loaded neighbors.
    ///
    /// Returns `true` if the zone was loaded by this call.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ZoneOutOfBounds`] if the zone does not exist.
    pub fn ensure_zone_loaded(
        &mut self,
        coord: ZoneCoord,
        stamp: &TickStamp,
    ) -> Result<bool, WorldError> {
        let zone = self
            .zone_mut(coord)
            .ok_or(WorldError::ZoneOutOfBounds(coord))?;
        if zone.is_loaded() {
            return Ok(false);
        }
        zone.on_load(stamp)?;
        self.stitch_borders(coord);
        Ok(true)
    }

    /// Add cross-zone neighbor links between `coord`'s border tiles and the
    /// border tiles of every loaded adjacent zone.
    fn stitch_borders(&mut self, coord: ZoneCoord) {
        let Some(zone) = self.zone(coord) else {
            return;
        };
        let (width, depth) = zone.dimensions();
        let last_x = width.saturating_sub(1);
        let last_z = depth.saturating_sub(1);

        let mut links: Vec<(GlobalCoord, GlobalCoord)> = Vec::new();
        for tile in zone.tiles() {
            let local = tile.local();
            if local.x != 0 && local.z != 0 && local.x != last_x && local.z != last_z {
                continue;
            }
            for (dx, dz) in NEIGHBOR_OFFSETS {
                let Some(other) = tile.global().offset(dx, dz) else {
                    continue;
                };
                let Some(address) = self.resolve(other) else {
                    continue;
                };
                if address.zone == coord {
                    continue;
                }
                if self.zone(address.zone).is_some_and(Zone::is_loaded) {
                    links.push((tile.global(), other));
                }
            }
        }

        let count = links.len();
        for (here, there) in links {
            if let Some(tile) = self.tile_mut(here) {
                tile.add_neighbor(there);
            }
            if let Some(tile) = self.tile_mut(there) {
                tile.add_neighbor(here);
            }
        }
        debug!(zone = %coord, links = count, "Zone borders stitched");
    }

    /// Unload a zone whose tiles are all Cold and unoccupied, removing the cross-zone
    /// links its neighbors hold into it. Returns the number of tiles
    /// dropped (zero if it was not loaded).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ZoneOutOfBounds`] if the zone does not exist,
    /// or [`WorldError::ZoneBusy`] if any of its tiles is Warm, Hot, or
    /// holds an agent.
    pub fn unload_zone(&mut self, coord: ZoneCoord) -> Result<usize, WorldError> {
        let zone = self
            .zone_mut(coord)
            .ok_or(WorldError::ZoneOutOfBounds(coord))?;
        if !zone.is_loaded() {
            return Ok(0);
        }
        let live = zone
            .tiles()
            .filter(|tile| tile.state() != LoadState::Cold || tile.agent().is_some())
            .count();
        if live > 0 {
            return Err(WorldError::ZoneBusy { zone: coord, live });
        }
        let dropped = zone.on_unload();
        let neighbors = zone.neighbors().to_vec();

        let dims = self.dims;
        for neighbor in neighbors {
            if let Some(other) = self.zone_mut(neighbor) {
                for tile in other.tiles_mut() {
                    tile.retain_neighbors(|g| {
                        !zone_of(&dims, *g).is_some_and(|owner| owner == coord)
                    });
                }
            }
        }
        Ok(dropped)
    }

    // -------------------------------------------------------------------
    // Tiles
    // -------------------------------------------------------------------

    /// Look up a tile in a loaded zone.
    pub fn tile(&self, global: GlobalCoord) -> Option<&Tile> {
        let address = self.resolve(global)?;
        self.zone(address.zone)?.tile(address.local)
    }

    /// Look up a tile mutably in a loaded zone.
    pub fn tile_mut(&mut self, global: GlobalCoord) -> Option<&mut Tile> {
        let address = self.resolve(global)?;
        self.zone_mut(address.zone)?.tile_mut(address.local)
    }

    /// Look up a tile, loading its zone first if necessary.
    ///
    /// Returns `Ok(None)` if the coordinate is outside the world.
    ///
    /// # Errors
    ///
    /// Propagates zone loading failures.
    pub fn wake_tile(
        &mut self,
        global: GlobalCoord,
        stamp: &TickStamp,
    ) -> Result<Option<&mut Tile>, WorldError> {
        let Some(address) = self.resolve(global) else {
            return Ok(None);
        };
        self.ensure_zone_loaded(address.zone, stamp)?;
        Ok(self.tile_mut(global))
    }
}

/// Zone that owns a global coordinate, without bounds against the grid.
fn zone_of(dims: &WorldDimensions, global: GlobalCoord) -> Option<ZoneCoord> {
    let x = usize::try_from(global.x).ok()?;
    let z = usize::try_from(global.z).ok()?;
    Some(ZoneCoord::new(
        x.checked_div(dims.zone_width)?,
        z.checked_div(dims.zone_depth)?,
    ))
}
