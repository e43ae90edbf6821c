//! Headless scenery driver: zooms in on a point and pumps the tile cache.
//!
//! Usage: cargo run --release --bin scenery_sim -- [OPTIONS]
//!
//! Options:
//!   --root <DIR>        Scenery root (default: "scenery")
//!   --config <FILE>     JSON SceneryConfig; flags below override it
//!   --budget-mb <MB>    Cache budget in MiB, 0 = unlimited
//!   --tick-us <US>      Loading time slice per tick, microseconds
//!   --tick-ms <MS>      Delay between ticks, milliseconds
//!   --lat <DEG>         Latitude to zoom in on (default: 45.5)
//!   --lon <DEG>         Longitude to zoom in on (default: 7.5)
//!   --steps <N>         Zoom steps, each halving the scale (default: 12)
//!   --demo              Write a small synthetic scenery into --root first
//!
//! Set RUST_LOG=atlas_scenery=debug to follow every cache cycle.

use std::path::{Path, PathBuf};
use std::time::Instant;

use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};

use atlas_scenery::core::{Result, SystemClock};
use atlas_scenery::geo::{Bucket, Projection, TileName};
use atlas_scenery::scenery::{
    MeshChunk, MeshData, Scenery, SceneryConfig, Texture, TextureSidecar, Tile, TileRenderer,
    MAPS_DIR, MESH_EXTENSION, TERRAIN_DIR, write_mesh_file,
};
use atlas_scenery::streaming::TickStatus;

/// Pixels across the simulated viewport
const VIEWPORT_PX: f32 = 1024.0;
/// Camera height above the focus point
const ALTITUDE_M: f32 = 100_000.0;
/// Starting scale, metres per pixel
const START_SCALE: f32 = 4_000.0;

fn main() {
    atlas_scenery::core::logging::init();

    if let Err(e) = run() {
        log::error!("scenery_sim failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let root = PathBuf::from(parse_str_arg(&args, "--root").unwrap_or_else(|| "scenery".to_string()));
    let lat = parse_f64_arg(&args, "--lat").unwrap_or(45.5);
    let lon = parse_f64_arg(&args, "--lon").unwrap_or(7.5);
    let steps = parse_u32_arg(&args, "--steps").unwrap_or(12);

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => SceneryConfig::load(Path::new(&path))?,
        None => SceneryConfig::default(),
    };
    if let Some(mb) = parse_usize_arg(&args, "--budget-mb") {
        config.cache.budget_bytes = budget_bytes_from_mb(mb);
    }
    if let Some(us) = parse_u64_arg(&args, "--tick-us") {
        config.cache.tick_budget_micros = us;
    }
    if let Some(ms) = parse_u64_arg(&args, "--tick-ms") {
        config.cache.tick_interval_millis = ms;
    }

    if args.iter().any(|a| a == "--demo") {
        write_demo_scenery(&root, lat, lon)?;
    }

    println!("=== Scenery Simulation ===");
    println!("Root:       {}", root.display());
    println!("Focus:      {:.3}, {:.3}", lat, lon);
    println!("Projection: {:?}", config.projection);
    println!("Budget:     {:.1} MiB", config.cache.budget_bytes as f64 / (1024.0 * 1024.0));
    println!("Tick:       {} us every {} ms", config.cache.tick_budget_micros, config.cache.tick_interval_millis);
    println!();

    let projection = config.projection;
    let mut scenery = Scenery::open(&root, config)?;
    if scenery.tiles().is_empty() {
        log::warn!("No tiles under {}, try --demo", root.display());
    }

    let mut scale = START_SCALE;
    for step in 0..steps {
        let (eye, view, proj) = camera(projection, lat, lon, scale);
        scenery.on_move(eye, view);
        scenery.on_zoom(scale, proj);

        let started = Instant::now();
        scenery.update();
        let ticks = pump(&mut scenery);

        let mut counter = DrawCounter::default();
        scenery.draw(&mut counter);

        let stats = scenery.cache().stats();
        println!(
            "step {:2}: {:8.1} m/px  level {:>4}  live {:5}  visible {:3}  drawn {:3} tex / {:4} mesh  \
             resident {:8.1} KiB  ticks {:3}  evicted {:3}  {:6.1} ms",
            step,
            scale,
            scenery.view().level.map_or("-".to_string(), |l| l.to_string()),
            scenery.view().live_needed,
            scenery.visible().len(),
            counter.textures,
            counter.meshes,
            scenery.cache().resident_bytes() as f64 / 1024.0,
            ticks,
            stats.evicted,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        if let Some(elevation) = scenery.max_elevation_at(lat, lon) {
            log::debug!("Max elevation at focus: {} m", elevation);
        }

        scale *= 0.5;
    }

    let stats = scenery.cache().stats();
    println!();
    println!("=== Done ===");
    println!("Ticks:        {}", stats.ticks);
    println!("Load steps:   {}", stats.load_steps);
    println!("Unload steps: {}", stats.unload_steps);
    println!("Evicted:      {}", stats.evicted);
    Ok(())
}

/// Orthographic camera looking straight down at (lat, lon)
fn camera(projection: Projection, lat: f64, lon: f64, scale: f32) -> (Vec3, Mat4, Mat4) {
    let target = projection.project(lat, lon, 0.0);
    let up = projection.up(lat, lon);
    let north = (projection.project(lat + 0.01, lon, 0.0) - target).normalize_or_zero();
    let eye = target + up * ALTITUDE_M;

    let half = scale * VIEWPORT_PX * 0.5;
    let view = Mat4::look_at_rh(eye, target, north);
    let proj = Mat4::orthographic_rh(-half, half, -half, half, 1.0, ALTITUDE_M * 2.0);
    (eye, view, proj)
}

/// Run ticks until the cache goes idle, sleeping as asked
fn pump(scenery: &mut Scenery) -> usize {
    let clock = SystemClock;
    let mut ticks = 0;
    while scenery.needs_tick() {
        ticks += 1;
        if let TickStatus::Rearm(delay) = scenery.tick(&clock) {
            std::thread::sleep(delay);
        }
    }
    ticks
}

#[derive(Default)]
struct DrawCounter {
    textures: usize,
    meshes: usize,
}

impl TileRenderer for DrawCounter {
    fn draw_texture(&mut self, _tile: &Tile, _texture: &Texture) {
        self.textures += 1;
    }

    fn draw_mesh(&mut self, _tile: &Tile, _chunk: &MeshChunk) {
        self.meshes += 1;
    }
}

/// Finest imagery level the demo writes
const DEMO_MAX_LEVEL: u32 = 8;

/// 3x3 tiles around the focus with imagery at every level up to
/// [`DEMO_MAX_LEVEL`], and flat terrain for every bucket of the centre tile
fn write_demo_scenery(root: &Path, lat: f64, lon: f64) -> Result<()> {
    let started = Instant::now();
    let centre = TileName::containing(lat, lon);
    let mut tiles = Vec::new();
    for dlat in -1..=1 {
        for dlon in -1..=1 {
            let name = TileName::containing(
                centre.lat as f64 + dlat as f64 + 0.5,
                centre.lon as f64 + dlon as f64 * centre.width() + 0.5 * centre.width(),
            );
            if !tiles.contains(&name) {
                tiles.push(name);
            }
        }
    }

    for name in &tiles {
        let elevation = 500.0 + 100.0 * ((name.lat + name.lon).rem_euclid(10)) as f32;
        for level in 0..=DEMO_MAX_LEVEL {
            let dir = root.join(MAPS_DIR).join(level.to_string());
            std::fs::create_dir_all(&dir)?;
            let size = 1u32 << level;
            let shade = (level * 255 / DEMO_MAX_LEVEL) as u8;
            let path = dir.join(format!("{}.png", name));
            RgbaImage::from_pixel(size, size, Rgba([shade, 128, 255 - shade, 255])).save(&path)?;
            TextureSidecar { max_elevation: Some(elevation) }.save(&TextureSidecar::path_for(&path))?;
        }
    }

    let mut chunks = 0;
    for index in candidate_buckets(centre) {
        let Some(bucket) = Bucket::from_index(index) else {
            continue;
        };
        let path = root
            .join(TERRAIN_DIR)
            .join(centre.to_string())
            .join(format!("{}.{}", bucket.index(), MESH_EXTENSION));
        write_mesh_file(&path, &MeshData::flat_quad(&bucket.bounds(), 750.0))?;
        chunks += 1;
    }

    log::info!(
        "Wrote demo scenery: {} tiles, {} mesh chunks in {:?}",
        tiles.len(),
        chunks,
        started.elapsed()
    );
    Ok(())
}

/// Every row/column combination a tile could have
fn candidate_buckets(tile: TileName) -> impl Iterator<Item = u64> {
    (0..8u32).flat_map(move |y| {
        (0..8u32).map(move |x| Bucket { lat: tile.lat, lon: tile.lon, x, y }.index())
    })
}

/// `--budget-mb` in bytes, clamped instead of overflowing
fn budget_bytes_from_mb(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

fn parse_f64_arg(args: &[String], flag: &str) -> Option<f64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_mb_saturates() {
        assert_eq!(budget_bytes_from_mb(0), 0);
        assert_eq!(budget_bytes_from_mb(3), 3 * 1024 * 1024);
        assert_eq!(budget_bytes_from_mb(usize::MAX), usize::MAX);
    }
}
