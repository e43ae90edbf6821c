//! Scenery configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::geo::{Projection, EQUATOR_DEGREE_METRES};
use crate::streaming::{CacheConfig, LevelSet, ResolutionPicker, DEFAULT_LIVE_THRESHOLD};

/// Everything tunable about a [`Scenery`](super::Scenery)
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneryConfig {
    pub cache: CacheConfig,
    /// Ground size of one LOD 0 tile at the equator
    pub reference_size_metres: f32,
    /// Metres per pixel below which live terrain may be drawn
    pub live_threshold_metres_per_pixel: f32,
    pub projection: Projection,
    /// Master switch for live terrain meshes
    pub live_enabled: bool,
}

impl Default for SceneryConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            reference_size_metres: EQUATOR_DEGREE_METRES,
            live_threshold_metres_per_pixel: DEFAULT_LIVE_THRESHOLD,
            projection: Projection::default(),
            live_enabled: true,
        }
    }
}

impl SceneryConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.reference_size_metres > 0.0 && self.reference_size_metres.is_finite()) {
            return Err(Error::Config(format!(
                "reference_size_metres must be positive, got {}",
                self.reference_size_metres
            )));
        }
        if !(self.live_threshold_metres_per_pixel >= 0.0) {
            return Err(Error::Config(format!(
                "live_threshold_metres_per_pixel must not be negative, got {}",
                self.live_threshold_metres_per_pixel
            )));
        }
        Ok(())
    }

    /// Resolution picker over the given catalog levels
    pub fn picker(&self, levels: LevelSet) -> ResolutionPicker {
        ResolutionPicker::new(levels)
            .with_reference_size(self.reference_size_metres)
            .with_live_threshold(self.live_threshold_metres_per_pixel)
    }
}
