//! Pre-rendered imagery for one tile at one LOD level

use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::core::types::Result;

/// Metadata stored next to an image as `<tile>.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureSidecar {
    /// Highest terrain in the tile, in metres
    #[serde(default)]
    pub max_elevation: Option<f32>,
}

impl TextureSidecar {
    /// Sidecar location for an image path
    pub fn path_for(image_path: &Path) -> PathBuf {
        image_path.with_extension("json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Image resource handle
pub struct Texture {
    level: u32,
    path: PathBuf,
    pixels: Option<RgbaImage>,
    max_elevation: Option<f32>,
}

impl Texture {
    pub fn new(level: u32, path: PathBuf) -> Self {
        Self {
            level,
            path,
            pixels: None,
            max_elevation: None,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.pixels.is_some()
    }

    /// Decode the image and its sidecar
    ///
    /// Returns false if the image could not be read. A missing or broken
    /// sidecar only loses the elevation.
    pub fn load(&mut self) -> bool {
        let pixels = match image::open(&self.path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::warn!("Failed to load texture {}: {}", self.path.display(), e);
                return false;
            }
        };

        let sidecar_path = TextureSidecar::path_for(&self.path);
        self.max_elevation = if sidecar_path.exists() {
            match TextureSidecar::load(&sidecar_path) {
                Ok(sidecar) => sidecar.max_elevation,
                Err(e) => {
                    log::warn!("Ignoring sidecar {}: {}", sidecar_path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        log::trace!(
            "Loaded texture {} ({}x{})",
            self.path.display(),
            pixels.width(),
            pixels.height()
        );
        self.pixels = Some(pixels);
        true
    }

    pub fn unload(&mut self) {
        self.pixels = None;
    }

    /// RGBA8 footprint of the decoded image
    pub fn size_bytes(&self) -> usize {
        self.pixels
            .as_ref()
            .map_or(0, |p| p.width() as usize * p.height() as usize * 4)
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    /// Elevation from the sidecar, as of the last successful load
    pub fn max_elevation(&self) -> Option<f32> {
        self.max_elevation
    }
}
