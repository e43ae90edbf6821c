//! World map scenery: catalog, tiles, their resources and the orchestrator

pub mod config;
pub mod catalog;
pub mod texture;
pub mod mesh;
pub mod tile;
pub mod query;
pub mod orchestrator;

pub use config::SceneryConfig;
pub use catalog::{Catalog, TileMetadata, MAPS_DIR, MESH_EXTENSION, TERRAIN_DIR};
pub use texture::{Texture, TextureSidecar};
pub use mesh::{
    GeoVertex, MeshChunk, MeshData,
    decode_mesh, encode_mesh, read_mesh_file, write_mesh_file,
};
pub use tile::{SceneryView, Tile};
pub use query::{FrustumQuery, LinearFrustumQuery};
pub use orchestrator::{Scenery, TileRenderer};
pub use crate::streaming::LevelSet;
