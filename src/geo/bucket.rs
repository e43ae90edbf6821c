//! Mesh-chunk buckets
//!
//! Each tile is cut into eight rows of 1/8 degree. The number of columns per
//! row depends on latitude so chunks stay roughly square on the ground. A
//! bucket index packs the tile corner and the row/column into one integer:
//! `(lon + 180) << 14 | (lat + 90) << 6 | y << 3 | x`.

use crate::math::Aabb;
use super::projection::{GeoBounds, Projection, MAX_TERRAIN_ELEVATION_M, MIN_TERRAIN_ELEVATION_M};
use super::tile_name::TileName;

/// Rows per tile
pub const BUCKET_ROWS: u32 = 8;

/// Longitude span in degrees of a bucket centred at `lat`
pub fn bucket_span(lat: f64) -> f64 {
    let lat = lat.abs();
    if lat >= 89.0 {
        360.0
    } else if lat >= 88.0 {
        8.0
    } else if lat >= 86.0 {
        4.0
    } else if lat >= 83.0 {
        2.0
    } else if lat >= 76.0 {
        1.0
    } else if lat >= 62.0 {
        0.5
    } else if lat >= 22.0 {
        0.25
    } else {
        0.125
    }
}

/// One loadable unit of terrain mesh within a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    pub lat: i32,
    pub lon: i32,
    /// Column within the tile
    pub x: u32,
    /// Row within the tile
    pub y: u32,
}

impl Bucket {
    /// Bucket containing a geographic position
    pub fn containing(lat: f64, lon: f64) -> Self {
        let tile = TileName::containing(lat, lon);
        let y = (((lat - tile.lat as f64) * BUCKET_ROWS as f64).floor() as u32).min(BUCKET_ROWS - 1);
        let row_lat = tile.lat as f64 + (y as f64 + 0.5) / BUCKET_ROWS as f64;
        let span = bucket_span(row_lat);
        let x = if span >= 1.0 {
            0
        } else {
            (((lon - tile.lon as f64) / span).floor() as u32).min(Self::columns_for(span) - 1)
        };
        Self { lat: tile.lat, lon: tile.lon, x, y }
    }

    /// Decode a packed bucket index
    pub fn from_index(index: u64) -> Option<Self> {
        let lon = ((index >> 14) & 0x1ff) as i32 - 180;
        let lat = ((index >> 6) & 0xff) as i32 - 90;
        let y = ((index >> 3) & 0x7) as u32;
        let x = (index & 0x7) as u32;
        if index >> 23 != 0 || !(-180..180).contains(&lon) || !(-90..90).contains(&lat) {
            return None;
        }
        let bucket = Self { lat, lon, x, y };
        (x < Self::columns_for(bucket.span())).then_some(bucket)
    }

    /// Packed index, the inverse of [`Bucket::from_index`]
    pub fn index(&self) -> u64 {
        ((self.lon + 180) as u64) << 14
            | ((self.lat + 90) as u64) << 6
            | (self.y as u64) << 3
            | self.x as u64
    }

    /// The tile this bucket belongs to
    pub fn tile(&self) -> TileName {
        TileName { lat: self.lat, lon: self.lon }
    }

    /// Longitude span of this bucket
    pub fn span(&self) -> f64 {
        bucket_span(self.lat as f64 + (self.y as f64 + 0.5) / BUCKET_ROWS as f64)
    }

    /// Geographic footprint
    pub fn bounds(&self) -> GeoBounds {
        let south = self.lat as f64 + self.y as f64 / BUCKET_ROWS as f64;
        let span = self.span();
        let west = self.lon as f64 + if span < 1.0 { self.x as f64 * span } else { 0.0 };
        GeoBounds::new(
            south,
            west,
            south + 1.0 / BUCKET_ROWS as f64,
            (west + span).min(180.0),
        )
    }

    /// Render-space box around the footprint, lowest to highest terrain
    pub fn projected_bounds(&self, projection: Projection) -> Aabb {
        self.bounds()
            .projected_aabb(projection, MIN_TERRAIN_ELEVATION_M, MAX_TERRAIN_ELEVATION_M)
    }

    fn columns_for(span: f64) -> u32 {
        if span < 1.0 { (1.0 / span).round() as u32 } else { 1 }
    }
}
