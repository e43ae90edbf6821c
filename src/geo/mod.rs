//! Geographic helpers: projections, tile names and mesh-chunk buckets

pub mod projection;
pub mod tile_name;
pub mod bucket;

pub use projection::{
    GeoBounds, Projection, EARTH_RADIUS_M, EQUATOR_DEGREE_METRES,
    MAX_TERRAIN_ELEVATION_M, MIN_TERRAIN_ELEVATION_M,
};
pub use tile_name::{TileName, TileNameError, tile_width};
pub use bucket::{Bucket, bucket_span};
