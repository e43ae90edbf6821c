//! Mapping geodetic coordinates into render space

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;
use crate::math::Aabb;

/// Mean earth radius in metres (spherical model)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Length of one degree of longitude at the equator, in metres
pub const EQUATOR_DEGREE_METRES: f32 = 111_319.49;

/// Lowest terrain considered when bounding unloaded geometry
pub const MIN_TERRAIN_ELEVATION_M: f64 = -500.0;

/// Highest terrain considered when bounding unloaded geometry
pub const MAX_TERRAIN_ELEVATION_M: f64 = 9_000.0;

/// How geodetic positions become render-space points
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Earth-centred cartesian coordinates on a sphere
    #[default]
    Cartesian,
    /// Flat map: x east and y north in equator-scale metres, z up
    Equirectangular,
}

impl Projection {
    /// Project latitude/longitude (degrees) and elevation (metres)
    pub fn project(self, lat_deg: f64, lon_deg: f64, elevation_m: f64) -> Vec3 {
        match self {
            Projection::Cartesian => {
                let lat = lat_deg.to_radians();
                let lon = lon_deg.to_radians();
                let r = EARTH_RADIUS_M + elevation_m;
                Vec3::new(
                    (r * lat.cos() * lon.cos()) as f32,
                    (r * lat.cos() * lon.sin()) as f32,
                    (r * lat.sin()) as f32,
                )
            }
            Projection::Equirectangular => {
                let m = EQUATOR_DEGREE_METRES as f64;
                Vec3::new(
                    (lon_deg * m) as f32,
                    (lat_deg * m) as f32,
                    elevation_m as f32,
                )
            }
        }
    }

    /// Direction that points "up" (away from the ground) at a location
    pub fn up(self, lat_deg: f64, lon_deg: f64) -> Vec3 {
        match self {
            Projection::Cartesian => self.project(lat_deg, lon_deg, 0.0).normalize_or_zero(),
            Projection::Equirectangular => Vec3::Z,
        }
    }
}

/// Latitude/longitude rectangle in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    /// (lat, lon) of the centre
    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) * 0.5, (self.west + self.east) * 0.5)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat < self.north && lon >= self.west && lon < self.east
    }

    /// Render-space box enclosing this footprint between two elevations
    ///
    /// Samples a 5x5 grid at both elevations so the bulge of the sphere
    /// between the corners is covered.
    pub fn projected_aabb(&self, projection: Projection, min_elev: f64, max_elev: f64) -> Aabb {
        const STEPS: usize = 4;
        let points = (0..=STEPS).flat_map(move |i| {
            (0..=STEPS).flat_map(move |j| {
                let lat = self.south + (self.north - self.south) * i as f64 / STEPS as f64;
                let lon = self.west + (self.east - self.west) * j as f64 / STEPS as f64;
                [
                    projection.project(lat, lon, min_elev),
                    projection.project(lat, lon, max_elev),
                ]
            })
        });
        // The grid is never empty, so the fallback is unreachable
        Aabb::from_points(points).unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_axes() {
        let p = Projection::Cartesian.project(0.0, 0.0, 0.0);
        assert!((p.x - EARTH_RADIUS_M as f32).abs() < 1.0);
        assert!(p.y.abs() < 1.0 && p.z.abs() < 1.0);

        let north_pole = Projection::Cartesian.project(90.0, 0.0, 100.0);
        assert!((north_pole.z - (EARTH_RADIUS_M + 100.0) as f32).abs() < 1.0);

        let east = Projection::Cartesian.project(0.0, 90.0, 0.0);
        assert!((east.y - EARTH_RADIUS_M as f32).abs() < 1.0);
    }

    #[test]
    fn test_equirectangular() {
        let p = Projection::Equirectangular.project(1.0, -2.0, 300.0);
        assert!((p.x + 2.0 * EQUATOR_DEGREE_METRES).abs() < 0.1);
        assert!((p.y - EQUATOR_DEGREE_METRES).abs() < 0.1);
        assert_eq!(p.z, 300.0);
        assert_eq!(Projection::Equirectangular.up(10.0, 10.0), Vec3::Z);
    }

    #[test]
    fn test_projected_aabb_contains_footprint() {
        let bounds = GeoBounds::new(40.0, -74.0, 41.0, -73.0);
        let aabb = bounds.projected_aabb(Projection::Cartesian, 0.0, 9000.0);
        let (lat, lon) = bounds.center();
        assert!(aabb.contains_point(Projection::Cartesian.project(lat, lon, 0.0)));
        assert!(aabb.contains_point(Projection::Cartesian.project(lat, lon, 9000.0)));
        assert!(!aabb.contains_point(Projection::Cartesian.project(lat, lon + 2.0, 0.0)));
    }

    #[test]
    fn test_projection_serde_names() {
        let json = serde_json::to_string(&Projection::Equirectangular).unwrap();
        assert_eq!(json, "\"equirectangular\"");
        let p: Projection = serde_json::from_str("\"cartesian\"").unwrap();
        assert_eq!(p, Projection::Cartesian);
    }
}
