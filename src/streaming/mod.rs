//! Budgeted, time-sliced residency for streamed map resources

pub mod budget;
pub mod priority;
pub mod cacheable;
pub mod cache;
pub mod lod;

pub use budget::ByteBudget;
pub use priority::{Scheduled, sort_farthest_first, sort_nearest_first};
pub use cacheable::{CacheStore, Cacheable};
pub use cache::{Cache, CacheConfig, CacheStats, TickStatus};
pub use lod::{
    LevelSet, Resolution, ResolutionPicker, ideal_level,
    DEFAULT_LIVE_THRESHOLD, MAX_LEVEL,
};
