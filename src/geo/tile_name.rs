//! Tile naming in the `e000n40` style
//!
//! A tile is named after its south-west corner: hemisphere letter and three
//! longitude digits, then hemisphere letter and two latitude digits. Tiles are
//! one degree tall; their width grows toward the poles (see [`tile_width`]).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::bucket::bucket_span;
use super::projection::GeoBounds;

/// Errors from parsing a tile name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileNameError {
    #[error("tile name must look like e000n40, got {0:?}")]
    Malformed(String),
    #[error("tile latitude {0} out of range")]
    Latitude(i32),
    #[error("tile longitude {0} out of range")]
    Longitude(i32),
}

/// Width in degrees of the tile whose south edge is at `lat`
pub fn tile_width(lat: i32) -> f64 {
    bucket_span(lat as f64 + 0.5).max(1.0)
}

/// Identifies one spatial cell by its south-west corner in whole degrees
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileName {
    pub lat: i32,
    pub lon: i32,
}

impl TileName {
    /// Create a tile name, checking the corner is a valid tile origin
    pub fn new(lat: i32, lon: i32) -> Result<Self, TileNameError> {
        if !(-90..90).contains(&lat) {
            return Err(TileNameError::Latitude(lat));
        }
        if !(-180..180).contains(&lon) {
            return Err(TileNameError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// The tile covering a geographic position
    pub fn containing(lat: f64, lon: f64) -> Self {
        let lat = (lat.floor() as i32).clamp(-90, 89);
        let width = tile_width(lat);
        let columns = (360.0 / width).round();
        let column = ((lon + 180.0) / width).floor().clamp(0.0, columns - 1.0);
        let lon = (column * width - 180.0) as i32;
        Self { lat, lon }
    }

    /// Width in degrees of this tile
    pub fn width(&self) -> f64 {
        tile_width(self.lat)
    }

    /// Geographic footprint
    pub fn bounds(&self) -> GeoBounds {
        let south = self.lat as f64;
        let west = self.lon as f64;
        GeoBounds::new(south, west, south + 1.0, (west + self.width()).min(180.0))
    }
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ew = if self.lon < 0 { 'w' } else { 'e' };
        let ns = if self.lat < 0 { 's' } else { 'n' };
        write!(f, "{}{:03}{}{:02}", ew, self.lon.abs(), ns, self.lat.abs())
    }
}

impl FromStr for TileName {
    type Err = TileNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TileNameError::Malformed(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 7 || !s.is_ascii() {
            return Err(malformed());
        }

        let lon_sign = match bytes[0] {
            b'e' | b'E' => 1,
            b'w' | b'W' => -1,
            _ => return Err(malformed()),
        };
        let lat_sign = match bytes[4] {
            b'n' | b'N' => 1,
            b's' | b'S' => -1,
            _ => return Err(malformed()),
        };
        let lon: i32 = s[1..4].parse().map_err(|_| malformed())?;
        let lat: i32 = s[5..7].parse().map_err(|_| malformed())?;

        Self::new(lat * lat_sign, lon * lon_sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(TileName::new(40, 0).unwrap().to_string(), "e000n40");
        assert_eq!(TileName::new(-5, -123).unwrap().to_string(), "w123s05");
        assert_eq!(TileName::new(37, -122).unwrap().to_string(), "w122n37");
    }

    #[test]
    fn test_parse() {
        let name: TileName = "w122n37".parse().unwrap();
        assert_eq!(name, TileName { lat: 37, lon: -122 });
        let name: TileName = "E010S34".parse().unwrap();
        assert_eq!(name, TileName { lat: -34, lon: 10 });

        assert!("w122n3".parse::<TileName>().is_err());
        assert!("x122n37".parse::<TileName>().is_err());
        assert!("w1a2n37".parse::<TileName>().is_err());
        assert_eq!("e200n10".parse::<TileName>(), Err(TileNameError::Longitude(200)));
        assert_eq!("e010n95".parse::<TileName>(), Err(TileNameError::Latitude(95)));
    }

    #[test]
    fn test_containing() {
        assert_eq!(TileName::containing(37.6, -122.4), TileName { lat: 37, lon: -123 });
        assert_eq!(TileName::containing(-0.5, 0.5), TileName { lat: -1, lon: 0 });
        assert_eq!(TileName::containing(90.0, 180.0), TileName { lat: 89, lon: -180 });
    }

    #[test]
    fn test_width_grows_near_poles() {
        assert_eq!(tile_width(0), 1.0);
        assert_eq!(tile_width(82), 1.0);
        assert_eq!(tile_width(83), 2.0);
        assert_eq!(tile_width(-84), 2.0);
        assert_eq!(tile_width(86), 4.0);
        assert_eq!(tile_width(88), 8.0);
        assert_eq!(tile_width(89), 360.0);

        // Snapped to the tile grid at that latitude
        assert_eq!(TileName::containing(84.5, 3.0), TileName { lat: 84, lon: 2 });
        assert_eq!(TileName::containing(88.5, -171.0), TileName { lat: 88, lon: -172 });
    }

    #[test]
    fn test_bounds() {
        let b = TileName::new(40, -74).unwrap().bounds();
        assert_eq!((b.south, b.west, b.north, b.east), (40.0, -74.0, 41.0, -73.0));
        assert!(b.contains(40.5, -73.5));
        assert!(!b.contains(41.0, -73.5));
    }
}
