//! Terrain mesh chunks and their on-disk format
//!
//! A mesh file is an LZ4 block (size prepended) holding
//! `[vertex_count: u32, index_count: u32]`, the vertices as
//! `[lat, lon, elevation]` f32 triples and then `u32` triangle indices, all
//! little-endian.

use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::geo::{Bucket, GeoBounds, Projection};
use crate::math::{Aabb, Ray};

const HEADER_SIZE: usize = 8;

/// Source vertex in geodetic coordinates
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GeoVertex {
    pub lat: f32,
    pub lon: f32,
    /// Metres above sea level
    pub elev: f32,
}

impl GeoVertex {
    pub fn new(lat: f32, lon: f32, elev: f32) -> Self {
        Self { lat, lon, elev }
    }
}

/// Decoded contents of a mesh file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<GeoVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Two triangles spanning a footprint at one elevation
    pub fn flat_quad(bounds: &GeoBounds, elevation: f32) -> Self {
        let (s, w) = (bounds.south as f32, bounds.west as f32);
        let (n, e) = (bounds.north as f32, bounds.east as f32);
        Self {
            vertices: vec![
                GeoVertex::new(s, w, elevation),
                GeoVertex::new(s, e, elevation),
                GeoVertex::new(n, e, elevation),
                GeoVertex::new(n, w, elevation),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Check the indices form whole triangles over existing vertices
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::Mesh(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        let count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(Error::Mesh(format!(
                "index {} out of range for {} vertices",
                bad, count
            )));
        }
        Ok(())
    }
}

/// Serialize and compress mesh data
pub fn encode_mesh(data: &MeshData) -> Result<Vec<u8>> {
    data.validate()?;

    let vertex_bytes: &[u8] = bytemuck::cast_slice(&data.vertices);
    let index_bytes: &[u8] = bytemuck::cast_slice(&data.indices);

    let mut raw = Vec::with_capacity(HEADER_SIZE + vertex_bytes.len() + index_bytes.len());
    raw.extend_from_slice(&(data.vertices.len() as u32).to_le_bytes());
    raw.extend_from_slice(&(data.indices.len() as u32).to_le_bytes());
    raw.extend_from_slice(vertex_bytes);
    raw.extend_from_slice(index_bytes);

    Ok(lz4_flex::compress_prepend_size(&raw))
}

/// Decompress and parse mesh data
pub fn decode_mesh(bytes: &[u8]) -> Result<MeshData> {
    let raw = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| Error::Mesh(format!("LZ4 decompression failed: {}", e)))?;

    if raw.len() < HEADER_SIZE {
        return Err(Error::Mesh(format!("truncated header ({} bytes)", raw.len())));
    }
    let vertex_count = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let index_count = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]) as usize;

    let vertex_len = vertex_count * std::mem::size_of::<GeoVertex>();
    let index_len = index_count * std::mem::size_of::<u32>();
    let expected = HEADER_SIZE + vertex_len + index_len;
    if raw.len() != expected {
        return Err(Error::Mesh(format!(
            "expected {} bytes for {} vertices and {} indices, got {}",
            expected,
            vertex_count,
            index_count,
            raw.len()
        )));
    }

    let body = &raw[HEADER_SIZE..];
    // Body is not aligned for GeoVertex, so copy out
    let vertices: Vec<GeoVertex> = bytemuck::pod_collect_to_vec(&body[..vertex_len]);
    let indices: Vec<u32> = bytemuck::pod_collect_to_vec(&body[vertex_len..]);

    let data = MeshData { vertices, indices };
    data.validate()?;
    Ok(data)
}

/// Write a mesh file, creating parent directories
pub fn write_mesh_file(path: &Path, data: &MeshData) -> Result<()> {
    let bytes = encode_mesh(data)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read and decode a mesh file
pub fn read_mesh_file(path: &Path) -> Result<MeshData> {
    let bytes = std::fs::read(path)?;
    decode_mesh(&bytes)
}

/// Geometry of a loaded chunk, in render space
struct LoadedMesh {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    bounds: Aabb,
    max_elevation: f32,
}

/// Handle to one bucket's terrain mesh
///
/// Created cheaply from catalog metadata; the geometry is read on
/// [`MeshChunk::load`] and dropped on [`MeshChunk::unload`].
pub struct MeshChunk {
    bucket: Bucket,
    path: PathBuf,
    /// Conservative box from the bucket footprint, valid before loading
    bounds: Aabb,
    mesh: Option<LoadedMesh>,
}

impl MeshChunk {
    pub fn new(bucket: Bucket, path: PathBuf, projection: Projection) -> Self {
        Self {
            bucket,
            path,
            bounds: bucket.projected_bounds(projection),
            mesh: None,
        }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Footprint box, or the tighter geometry box once loaded
    pub fn bounds(&self) -> Aabb {
        self.mesh.as_ref().map_or(self.bounds, |m| m.bounds)
    }

    pub fn is_loaded(&self) -> bool {
        self.mesh.is_some()
    }

    /// Read and project the geometry. Returns false on failure, leaving the
    /// chunk unloaded.
    pub fn load(&mut self, projection: Projection) -> bool {
        let data = match read_mesh_file(&self.path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Failed to load mesh chunk {}: {}", self.path.display(), e);
                return false;
            }
        };

        let positions: Vec<Vec3> = data
            .vertices
            .iter()
            .map(|v| projection.project(v.lat as f64, v.lon as f64, v.elev as f64))
            .collect();
        let Some(bounds) = Aabb::from_points(positions.iter().copied()) else {
            log::warn!("Mesh chunk {} has no vertices", self.path.display());
            return false;
        };
        let max_elevation = data
            .vertices
            .iter()
            .map(|v| v.elev)
            .fold(f32::NEG_INFINITY, f32::max);

        log::trace!(
            "Loaded mesh chunk {} ({} vertices, {} triangles)",
            self.bucket.index(),
            positions.len(),
            data.indices.len() / 3
        );

        self.mesh = Some(LoadedMesh {
            positions,
            indices: data.indices,
            bounds,
            max_elevation,
        });
        true
    }

    pub fn unload(&mut self) {
        self.mesh = None;
    }

    /// Bytes held by the loaded geometry (12 per vertex, 4 per index)
    pub fn size_bytes(&self) -> usize {
        self.mesh.as_ref().map_or(0, |m| {
            m.positions.len() * std::mem::size_of::<Vec3>() + m.indices.len() * 4
        })
    }

    /// Highest vertex elevation, if loaded
    pub fn max_elevation(&self) -> Option<f32> {
        self.mesh.as_ref().map(|m| m.max_elevation)
    }

    /// Projected vertex positions (empty if not loaded)
    pub fn positions(&self) -> &[Vec3] {
        match &self.mesh {
            Some(m) => &m.positions,
            None => &[],
        }
    }

    /// Triangle indices (empty if not loaded)
    pub fn indices(&self) -> &[u32] {
        match &self.mesh {
            Some(m) => &m.indices,
            None => &[],
        }
    }

    /// Nearest point where the segment `near..far` hits the surface
    pub fn intersects_ray(&self, near: Vec3, far: Vec3) -> Option<Vec3> {
        let mesh = self.mesh.as_ref()?;
        let length = near.distance(far);
        let ray = Ray::through(near, far);
        let (t_enter, _) = ray.intersects_aabb(&mesh.bounds)?;
        if t_enter > length {
            return None;
        }

        let mut best: Option<f32> = None;
        for tri in mesh.indices.chunks_exact(3) {
            let a = mesh.positions[tri[0] as usize];
            let b = mesh.positions[tri[1] as usize];
            let c = mesh.positions[tri[2] as usize];
            if let Some(t) = ray.intersects_triangle(a, b, c) {
                if t <= length && best.is_none_or(|best| t < best) {
                    best = Some(t);
                }
            }
        }
        best.map(|t| ray.at(t))
    }
}
