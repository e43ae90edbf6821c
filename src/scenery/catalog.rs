//! Discovery of the imagery and terrain available under a scenery root
//!
//! Layout:
//!
//! ```text
//! <root>/maps/<level>/<tile>.png|jpg     imagery, 2^level pixels high
//! <root>/maps/<level>/<tile>.json        optional {"max_elevation": f32}
//! <root>/terrain/<tile>/<bucket>.mesh    terrain chunk, bucket index in decimal
//! ```
//!
//! Anything else is ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::geo::{Bucket, Projection, TileName};
use crate::streaming::{LevelSet, MAX_LEVEL};
use super::tile::Tile;

pub const MAPS_DIR: &str = "maps";
pub const TERRAIN_DIR: &str = "terrain";
pub const MESH_EXTENSION: &str = "mesh";

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// What the catalog knows about one tile
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileMetadata {
    pub levels: LevelSet,
    /// Image file per level
    pub textures: BTreeMap<u32, PathBuf>,
    /// Mesh file per bucket index
    pub mesh_chunks: BTreeMap<u64, PathBuf>,
}

/// Index of a scenery root, built once at startup
#[derive(Clone, Debug)]
pub struct Catalog {
    root: PathBuf,
    tiles: BTreeMap<TileName, TileMetadata>,
    levels: LevelSet,
}

impl Catalog {
    /// Scan a scenery root. Fails only if the root itself cannot be read.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::Catalog(format!(
                "scenery root {} is not a directory",
                root.display()
            )));
        }

        let mut catalog = Self {
            root,
            tiles: BTreeMap::new(),
            levels: LevelSet::new(),
        };

        let maps = catalog.root.join(MAPS_DIR);
        if maps.is_dir() {
            catalog.scan_maps(&maps)?;
        }
        let terrain = catalog.root.join(TERRAIN_DIR);
        if terrain.is_dir() {
            catalog.scan_terrain(&terrain)?;
        }

        log::info!(
            "Catalog: {} tiles, levels {:?}, {} mesh chunks under {}",
            catalog.tiles.len(),
            catalog.levels.iter().collect::<Vec<_>>(),
            catalog.mesh_chunk_count(),
            catalog.root.display()
        );
        Ok(catalog)
    }

    fn scan_maps(&mut self, maps: &Path) -> Result<()> {
        for level_dir in sorted_entries(maps)? {
            if !level_dir.is_dir() {
                continue;
            }
            let Some(level) = file_name(&level_dir)
                .and_then(|name| name.parse::<u32>().ok())
                .filter(|&level| level <= MAX_LEVEL)
            else {
                log::debug!("Catalog: ignoring {}", level_dir.display());
                continue;
            };

            for path in sorted_entries(&level_dir)? {
                if !has_extension(&path, &IMAGE_EXTENSIONS) {
                    continue;
                }
                let Some(name) = file_stem(&path).and_then(|stem| stem.parse::<TileName>().ok())
                else {
                    log::debug!("Catalog: ignoring {}", path.display());
                    continue;
                };

                let tile = self.tiles.entry(name).or_default();
                // First image in name order wins if a level has several
                if tile.textures.contains_key(&level) {
                    log::warn!("Catalog: duplicate imagery {}", path.display());
                    continue;
                }
                tile.textures.insert(level, path);
                tile.levels.insert(level);
                self.levels.insert(level);
            }
        }
        Ok(())
    }

    fn scan_terrain(&mut self, terrain: &Path) -> Result<()> {
        for tile_dir in sorted_entries(terrain)? {
            if !tile_dir.is_dir() {
                continue;
            }
            let Some(name) = file_name(&tile_dir).and_then(|n| n.parse::<TileName>().ok()) else {
                log::debug!("Catalog: ignoring {}", tile_dir.display());
                continue;
            };

            for path in sorted_entries(&tile_dir)? {
                if !has_extension(&path, &[MESH_EXTENSION]) {
                    continue;
                }
                let bucket = file_stem(&path)
                    .and_then(|stem| stem.parse::<u64>().ok())
                    .and_then(Bucket::from_index);
                match bucket {
                    Some(bucket) if bucket.tile() == name => {
                        self.tiles
                            .entry(name)
                            .or_default()
                            .mesh_chunks
                            .insert(bucket.index(), path);
                    }
                    _ => log::warn!("Catalog: {} is not a bucket of {}", path.display(), name),
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tiles(&self) -> &BTreeMap<TileName, TileMetadata> {
        &self.tiles
    }

    pub fn get(&self, name: &TileName) -> Option<&TileMetadata> {
        self.tiles.get(name)
    }

    /// Every imagery level present in any tile
    pub fn levels(&self) -> LevelSet {
        self.levels
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn mesh_chunk_count(&self) -> usize {
        self.tiles.values().map(|t| t.mesh_chunks.len()).sum()
    }

    /// Build the tile registry, with nothing loaded
    pub fn build_tiles(&self, projection: Projection) -> BTreeMap<TileName, Tile> {
        self.tiles
            .iter()
            .map(|(&name, meta)| {
                let tile = Tile::new(
                    name,
                    projection,
                    meta.textures.clone(),
                    meta.mesh_chunks.clone(),
                );
                (name, tile)
            })
            .collect()
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|n| n.to_str())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}
