//! One spatial cell with its imagery levels and terrain mesh chunks

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use crate::core::types::Vec3;
use crate::geo::{
    Bucket, Projection, TileName, MAX_TERRAIN_ELEVATION_M, MIN_TERRAIN_ELEVATION_M,
};
use crate::math::{Aabb, Frustum};
use crate::streaming::{Cacheable, LevelSet};
use super::mesh::MeshChunk;
use super::texture::Texture;

/// What the current view wants from every tile
#[derive(Clone, Copy, Debug)]
pub struct SceneryView {
    /// Imagery level to load, `None` when there is no imagery at all
    pub level: Option<u32>,
    /// Load mesh chunks inside `frustum`
    pub live_needed: bool,
    pub frustum: Frustum,
}

impl Default for SceneryView {
    fn default() -> Self {
        Self {
            level: None,
            live_needed: false,
            frustum: Frustum::unbounded(),
        }
    }
}

/// Imagery and terrain for one [`TileName`]
///
/// Built from catalog metadata with nothing loaded. The cache drives loading
/// one sub-resource at a time; unloading drops everything at once.
pub struct Tile {
    name: TileName,
    projection: Projection,
    center: Vec3,
    bounds: Aabb,
    textures: BTreeMap<u32, Texture>,
    levels: LevelSet,
    /// Mesh files by bucket index, from the catalog
    chunk_paths: BTreeMap<u64, PathBuf>,
    /// Handles built from `chunk_paths` the first time live scenery is needed
    chunks: Option<Vec<MeshChunk>>,
    pending_texture: Option<u32>,
    /// Indices into `chunks`
    pending_chunks: VecDeque<usize>,
    max_elevation: Option<f32>,
}

impl Tile {
    pub fn new(
        name: TileName,
        projection: Projection,
        texture_paths: BTreeMap<u32, PathBuf>,
        chunk_paths: BTreeMap<u64, PathBuf>,
    ) -> Self {
        let footprint = name.bounds();
        let (lat, lon) = footprint.center();
        let levels = texture_paths.keys().copied().collect();
        let textures = texture_paths
            .into_iter()
            .map(|(level, path)| (level, Texture::new(level, path)))
            .collect();

        Self {
            name,
            projection,
            center: projection.project(lat, lon, 0.0),
            bounds: footprint.projected_aabb(
                projection,
                MIN_TERRAIN_ELEVATION_M,
                MAX_TERRAIN_ELEVATION_M,
            ),
            textures,
            levels,
            chunk_paths,
            chunks: None,
            pending_texture: None,
            pending_chunks: VecDeque::new(),
            max_elevation: None,
        }
    }

    pub fn name(&self) -> TileName {
        self.name
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Footprint centre at sea level, in render space
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Render-space box around the footprint and its terrain
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Levels with imagery on disk
    pub fn levels(&self) -> LevelSet {
        self.levels
    }

    /// Levels with imagery in memory
    pub fn loaded_levels(&self) -> LevelSet {
        self.textures
            .values()
            .filter(|t| t.is_loaded())
            .map(Texture::level)
            .collect()
    }

    pub fn texture(&self, level: u32) -> Option<&Texture> {
        self.textures.get(&level)
    }

    /// Closest loaded imagery to `level`, preferring finer
    pub fn best_texture_for(&self, level: u32) -> Option<&Texture> {
        let best = self.loaded_levels().best_match(level)?;
        self.textures.get(&best)
    }

    /// Number of mesh chunks the catalog lists for this tile
    pub fn chunk_count(&self) -> usize {
        self.chunk_paths.len()
    }

    pub fn loaded_chunks(&self) -> impl Iterator<Item = &MeshChunk> {
        self.chunks
            .iter()
            .flatten()
            .filter(|chunk| chunk.is_loaded())
    }

    /// First maximum elevation reported by loaded imagery or terrain
    ///
    /// Kept when the tile is unloaded.
    pub fn max_elevation(&self) -> Option<f32> {
        self.max_elevation
    }

    /// Whether a load step has work queued from the last `should_enter`
    pub fn has_pending_work(&self) -> bool {
        self.pending_texture.is_some() || !self.pending_chunks.is_empty()
    }

    /// Nearest point where `near..far` hits loaded terrain
    pub fn intersects_ray(&self, near: Vec3, far: Vec3) -> Option<Vec3> {
        self.loaded_chunks()
            .filter_map(|chunk| chunk.intersects_ray(near, far))
            .min_by(|a, b| a.distance_squared(near).total_cmp(&b.distance_squared(near)))
    }

    fn materialize_chunks(&mut self) -> &mut Vec<MeshChunk> {
        let projection = self.projection;
        let paths = &self.chunk_paths;
        let name = self.name;
        self.chunks.get_or_insert_with(|| {
            paths
                .iter()
                .filter_map(|(&index, path)| match Bucket::from_index(index) {
                    Some(bucket) => Some(MeshChunk::new(bucket, path.clone(), projection)),
                    None => {
                        log::warn!("Tile {}: skipping bad bucket index {}", name, index);
                        None
                    }
                })
                .collect()
        })
    }
}

impl Cacheable for Tile {
    type Context = SceneryView;

    fn distance_to(&self, focus: Vec3) -> f32 {
        self.center.distance(focus)
    }

    fn should_enter(&mut self, view: &SceneryView) -> bool {
        self.pending_texture = view
            .level
            .and_then(|level| self.levels.best_match(level))
            .filter(|level| {
                self.textures
                    .get(level)
                    .is_some_and(|texture| !texture.is_loaded())
            });

        self.pending_chunks.clear();
        if view.live_needed && !self.chunk_paths.is_empty() {
            let frustum = view.frustum;
            let wanted: Vec<usize> = self
                .materialize_chunks()
                .iter()
                .enumerate()
                .filter(|(_, chunk)| !chunk.is_loaded() && frustum.intersects_aabb(&chunk.bounds()))
                .map(|(i, _)| i)
                .collect();
            self.pending_chunks.extend(wanted);
        }

        self.has_pending_work()
    }

    fn step_load(&mut self, _view: &SceneryView) -> bool {
        if let Some(level) = self.pending_texture.take() {
            if let Some(texture) = self.textures.get_mut(&level) {
                if !texture.is_loaded() && texture.load() && self.max_elevation.is_none() {
                    self.max_elevation = texture.max_elevation();
                }
            }
        } else if let Some(i) = self.pending_chunks.pop_front() {
            let projection = self.projection;
            if let Some(chunk) = self.chunks.as_mut().and_then(|chunks| chunks.get_mut(i)) {
                if !chunk.is_loaded() && chunk.load(projection) && self.max_elevation.is_none() {
                    self.max_elevation = chunk.max_elevation();
                }
            }
        }

        !self.has_pending_work()
    }

    fn step_unload(&mut self) -> bool {
        for texture in self.textures.values_mut() {
            texture.unload();
        }
        for chunk in self.chunks.iter_mut().flatten() {
            chunk.unload();
        }
        self.pending_texture = None;
        self.pending_chunks.clear();
        true
    }

    fn resident_size(&self) -> usize {
        let textures: usize = self.textures.values().map(Texture::size_bytes).sum();
        let chunks: usize = self.chunks.iter().flatten().map(MeshChunk::size_bytes).sum();
        textures + chunks
    }
}
