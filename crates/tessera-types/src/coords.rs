//! Coordinate spaces for the tile world.
//!
//! Three spaces coexist:
//!
//! - [`GlobalCoord`] -- a tile position in world space. Signed so that
//!   neighbor arithmetic at the world edge produces an out-of-bounds
//!   coordinate instead of wrapping.
//! - [`ZoneCoord`] -- the column/row of a zone inside the world grid.
//! - [`LocalCoord`] -- a tile position inside its zone.
//!
//! The conversions between them live on `World`, which knows the zone
//! dimensions. This module only provides the distance metrics the working
//! set computation relies on.

use serde::{Deserialize, Serialize};

/// A tile position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalCoord {
    /// East-west axis.
    pub x: i32,
    /// North-south axis.
    pub z: i32,
}

impl GlobalCoord {
    /// Create a coordinate from its components.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Return the coordinate displaced by `(dx, dz)`, or `None` on overflow.
    pub fn offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// Chebyshev (ring) distance: the number of king moves between tiles.
    pub fn chebyshev(self, other: Self) -> u64 {
        let dx = i64::from(self.x).abs_diff(i64::from(other.x));
        let dz = i64::from(self.z).abs_diff(i64::from(other.z));
        dx.max(dz)
    }

    /// Squared Euclidean distance between tile centers.
    pub fn distance_sq(self, other: Self) -> u64 {
        let dx = i64::from(self.x).abs_diff(i64::from(other.x));
        let dz = i64::from(self.z).abs_diff(i64::from(other.z));
        dx.saturating_mul(dx).saturating_add(dz.saturating_mul(dz))
    }
}

impl core::fmt::Display for GlobalCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Position of a zone in the world's zone grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneCoord {
    /// Zone column.
    pub x: usize,
    /// Zone row.
    pub z: usize,
}

impl ZoneCoord {
    /// Create a zone coordinate from its components.
    pub const fn new(x: usize, z: usize) -> Self {
        Self { x, z }
    }
}

impl core::fmt::Display for ZoneCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "zone[{}, {}]", self.x, self.z)
    }
}

/// Position of a tile inside its zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalCoord {
    /// Column within the zone.
    pub x: usize,
    /// Row within the zone.
    pub z: usize,
}

impl LocalCoord {
    /// Create a local coordinate from its components.
    pub const fn new(x: usize, z: usize) -> Self {
        Self { x, z }
    }
}
