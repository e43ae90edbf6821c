//! Visibility queries over the tile registry

use std::collections::BTreeMap;

use crate::core::types::Mat4;
use crate::geo::TileName;
use crate::math::{Aabb, Frustum};
use super::tile::Tile;

/// Answers "which tiles does the current view see"
pub trait FrustumQuery {
    /// The camera moved; `view` is the new world-to-view transform
    fn on_move(&mut self, view: Mat4);

    /// The viewing volume changed
    fn on_zoom(&mut self, projection: Mat4);

    /// Current view frustum in world space
    fn frustum(&self) -> &Frustum;

    /// Tiles whose bounds intersect the current frustum
    fn intersecting(&self) -> Vec<TileName>;
}

/// Brute-force [`FrustumQuery`] testing every tile's bounding box
///
/// Until both a view and a projection are known the frustum accepts
/// everything.
pub struct LinearFrustumQuery {
    bounds: Vec<(TileName, Aabb)>,
    view: Option<Mat4>,
    projection: Option<Mat4>,
    frustum: Frustum,
}

impl LinearFrustumQuery {
    pub fn new(bounds: impl IntoIterator<Item = (TileName, Aabb)>) -> Self {
        Self {
            bounds: bounds.into_iter().collect(),
            view: None,
            projection: None,
            frustum: Frustum::unbounded(),
        }
    }

    pub fn from_tiles(tiles: &BTreeMap<TileName, Tile>) -> Self {
        Self::new(tiles.iter().map(|(&name, tile)| (name, tile.bounds())))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    fn rebuild(&mut self) {
        if let (Some(view), Some(projection)) = (self.view, self.projection) {
            self.frustum = Frustum::from_view_projection(&(projection * view));
        }
    }
}

impl FrustumQuery for LinearFrustumQuery {
    fn on_move(&mut self, view: Mat4) {
        self.view = Some(view);
        self.rebuild();
    }

    fn on_zoom(&mut self, projection: Mat4) {
        self.projection = Some(projection);
        self.rebuild();
    }

    fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    fn intersecting(&self) -> Vec<TileName> {
        self.bounds
            .iter()
            .filter(|(_, aabb)| self.frustum.intersects_aabb(aabb))
            .map(|(name, _)| *name)
            .collect()
    }
}
