//! Ties the tile registry, visibility query, resolution picker and cache
//! together and reacts to viewer movement

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::time::Clock;
use crate::core::types::{Mat4, Result, Vec3};
use crate::geo::TileName;
use crate::streaming::{Cache, Cacheable, LevelSet, Resolution, ResolutionPicker, TickStatus};
use super::catalog::Catalog;
use super::config::SceneryConfig;
use super::mesh::MeshChunk;
use super::query::{FrustumQuery, LinearFrustumQuery};
use super::texture::Texture;
use super::tile::{SceneryView, Tile};

/// Receives whatever is loaded when the scenery is drawn
pub trait TileRenderer {
    fn draw_texture(&mut self, tile: &Tile, texture: &Texture);

    fn draw_mesh(&mut self, tile: &Tile, chunk: &MeshChunk);
}

/// World map scenery
///
/// View changes only mark the scenery dirty. The next [`Scenery::update`]
/// (or [`Scenery::draw`]) re-queries visibility and restarts the cache cycle;
/// the host then pumps [`Scenery::tick`] while [`Scenery::needs_tick`].
pub struct Scenery<Q = LinearFrustumQuery> {
    config: SceneryConfig,
    tiles: BTreeMap<TileName, Tile>,
    cache: Cache<TileName>,
    query: Q,
    picker: ResolutionPicker,
    view: SceneryView,
    resolution: Resolution,
    /// Metres per pixel, `INFINITY` until the first zoom
    scale: f32,
    eye: Vec3,
    visible: Vec<TileName>,
    dirty: bool,
}

impl Scenery<LinearFrustumQuery> {
    /// Scan `root` and build the registry with a brute-force visibility query
    pub fn open(root: impl AsRef<Path>, config: SceneryConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Catalog::scan(root)?;
        let tiles = catalog.build_tiles(config.projection);
        let query = LinearFrustumQuery::from_tiles(&tiles);
        Ok(Self::new(config, catalog.levels(), tiles, query))
    }
}

impl<Q: FrustumQuery> Scenery<Q> {
    /// Create a scenery over an already built registry
    ///
    /// Nothing is loaded until the first [`Scenery::update`].
    ///
    /// # Arguments
    /// * `config` - Cache budget, LOD tuning and projection
    /// * `levels` - Imagery levels available anywhere in the catalog
    /// * `tiles` - Registry of every known tile, keyed by name
    /// * `query` - Visibility query over the same tiles
    pub fn new(
        config: SceneryConfig,
        levels: LevelSet,
        tiles: BTreeMap<TileName, Tile>,
        query: Q,
    ) -> Self {
        let picker = config.picker(levels);
        let cache = Cache::new(config.cache.clone());
        Self {
            config,
            tiles,
            cache,
            query,
            picker,
            view: SceneryView::default(),
            resolution: Resolution { level: None, live_needed: false },
            scale: f32::INFINITY,
            eye: Vec3::ZERO,
            visible: Vec::new(),
            dirty: true,
        }
    }

    /// The camera moved to `eye` with world-to-view transform `view`
    pub fn on_move(&mut self, eye: Vec3, view: Mat4) {
        self.eye = eye;
        self.query.on_move(view);
        self.dirty = true;
    }

    /// Scale (metres per pixel) or viewing volume changed
    pub fn on_zoom(&mut self, scale: f32, projection: Mat4) {
        self.query.on_zoom(projection);
        self.scale = scale;
        self.resolution = self.picker.pick(scale);
        self.view.level = self.resolution.level;
        self.view.live_needed = self.resolution.live_needed && self.config.live_enabled;
        log::debug!(
            "Scenery: scale {:.1} m/px -> level {:?}, live {}",
            scale,
            self.view.level,
            self.view.live_needed
        );
        self.dirty = true;
    }

    /// Restart the cache cycle if the view changed
    ///
    /// Only classifies tiles; no resource is read here. Loading happens in
    /// [`Scenery::tick`].
    ///
    /// # Returns
    /// True if a new cycle was started, false if the view was unchanged
    pub fn update(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        self.view.frustum = *self.query.frustum();
        self.visible = self.query.intersecting();

        self.cache.reset(self.eye, &self.tiles);
        for name in &self.visible {
            self.cache.add(*name, &mut self.tiles, &self.view);
        }
        self.cache.go();

        log::debug!(
            "Scenery: {} visible tiles, {} need loading",
            self.visible.len(),
            self.cache.pending_load_len()
        );
        true
    }

    /// Draw the best loaded imagery of every visible tile, plus loaded
    /// terrain while live scenery is on
    ///
    /// Calls [`Scenery::update`] first, then draws whatever is resident.
    /// Tiles still loading fall back to a coarser level or are skipped.
    ///
    /// # Arguments
    /// * `renderer` - Receives one call per texture and mesh chunk drawn
    pub fn draw<R: TileRenderer>(&mut self, renderer: &mut R) {
        self.update();

        for name in &self.visible {
            let Some(tile) = self.tiles.get(name) else {
                continue;
            };
            if let Some(texture) = self.view.level.and_then(|level| tile.best_texture_for(level)) {
                renderer.draw_texture(tile, texture);
            }
            if self.view.live_needed {
                for chunk in tile.loaded_chunks() {
                    renderer.draw_mesh(tile, chunk);
                }
            }
        }
    }

    /// Run one cache time slice
    pub fn tick<C: Clock + ?Sized>(&mut self, clock: &C) -> TickStatus {
        self.cache.tick(&mut self.tiles, &self.view, clock)
    }

    /// Whether the host should keep calling [`Scenery::tick`]
    pub fn needs_tick(&self) -> bool {
        self.cache.is_armed()
    }

    /// Nearest terrain hit along `near..far` among visible tiles
    pub fn pick(&self, near: Vec3, far: Vec3) -> Option<Vec3> {
        self.visible
            .iter()
            .filter_map(|name| self.tiles.get(name))
            .filter_map(|tile| tile.intersects_ray(near, far))
            .min_by(|a, b| a.distance_squared(near).total_cmp(&b.distance_squared(near)))
    }

    /// Highest known elevation in the tile under a position
    ///
    /// Tiles keep this value after eviction, so it stays available once
    /// anything in the tile has been loaded.
    pub fn max_elevation_at(&self, lat: f64, lon: f64) -> Option<f32> {
        self.tiles
            .get(&TileName::containing(lat, lon))
            .and_then(Tile::max_elevation)
    }

    pub fn config(&self) -> &SceneryConfig {
        &self.config
    }

    pub fn tiles(&self) -> &BTreeMap<TileName, Tile> {
        &self.tiles
    }

    pub fn tile(&self, name: &TileName) -> Option<&Tile> {
        self.tiles.get(name)
    }

    pub fn cache(&self) -> &Cache<TileName> {
        &self.cache
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn picker(&self) -> &ResolutionPicker {
        &self.picker
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Context handed to tiles in the current cycle
    pub fn view(&self) -> &SceneryView {
        &self.view
    }

    /// Tiles seen by the last update
    pub fn visible(&self) -> &[TileName] {
        &self.visible
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bytes held by every tile, loaded or not visible
    pub fn resident_bytes(&self) -> usize {
        self.tiles.values().map(Tile::resident_size).sum()
    }
}
