//! Level of detail selection for pre-rendered imagery
//!
//! Level `n` renders a tile `2^n` pixels high, so each level halves the
//! ground distance covered by one pixel. The picker maps the current viewer
//! scale (metres per screen pixel) onto the closest level the catalog has,
//! and decides when imagery is too coarse and live meshes must take over.

use crate::geo::EQUATOR_DEGREE_METRES;

/// Finest level a [`LevelSet`] can hold
pub const MAX_LEVEL: u32 = 31;

/// Below this scale (metres per pixel) coarse imagery looks too blurry
pub const DEFAULT_LIVE_THRESHOLD: f32 = 50.0;

/// Set of LOD levels 0..=31 stored as a bitmask
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LevelSet(u32);

impl LevelSet {
    pub const EMPTY: LevelSet = LevelSet(0);

    pub fn new() -> Self {
        Self::EMPTY
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Add a level. Levels above [`MAX_LEVEL`] are ignored.
    pub fn insert(&mut self, level: u32) {
        if level <= MAX_LEVEL {
            self.0 |= 1 << level;
        }
    }

    pub fn remove(&mut self, level: u32) {
        if level <= MAX_LEVEL {
            self.0 &= !(1 << level);
        }
    }

    pub fn contains(&self, level: u32) -> bool {
        level <= MAX_LEVEL && self.0 & (1 << level) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(&self, other: LevelSet) -> LevelSet {
        LevelSet(self.0 | other.0)
    }

    /// Coarsest level present
    pub fn coarsest(&self) -> Option<u32> {
        (self.0 != 0).then(|| self.0.trailing_zeros())
    }

    /// Finest level present
    pub fn finest(&self) -> Option<u32> {
        (self.0 != 0).then(|| MAX_LEVEL - self.0.leading_zeros())
    }

    /// Smallest present level >= `level`
    pub fn nearest_at_or_above(&self, level: u32) -> Option<u32> {
        if level > MAX_LEVEL {
            return None;
        }
        LevelSet(self.0 & (u32::MAX << level)).coarsest()
    }

    /// Largest present level <= `level`
    pub fn nearest_at_or_below(&self, level: u32) -> Option<u32> {
        let mask = if level >= MAX_LEVEL {
            u32::MAX
        } else {
            (1u32 << (level + 1)) - 1
        };
        LevelSet(self.0 & mask).finest()
    }

    /// Nearest present level, searching finer first, then coarser
    pub fn best_match(&self, level: u32) -> Option<u32> {
        self.nearest_at_or_above(level)
            .or_else(|| self.nearest_at_or_below(level))
    }

    /// Levels in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + use<> {
        let bits = self.0;
        (0..=MAX_LEVEL).filter(move |level| bits & (1 << level) != 0)
    }
}

impl FromIterator<u32> for LevelSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = LevelSet::new();
        for level in iter {
            set.insert(level);
        }
        set
    }
}

/// Level and live-mesh decision for one viewer scale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Imagery level to show, `None` when the catalog has no imagery at all
    pub level: Option<u32>,
    /// Whether live terrain meshes should be loaded and drawn
    pub live_needed: bool,
}

/// Ideal imagery level for a scale, before looking at what exists
///
/// `ceil(log2(reference / scale))`. Non-positive or non-finite scales mean
/// "as fine as possible".
pub fn ideal_level(reference_size_metres: f32, scale: f32) -> i32 {
    if !(scale > 0.0) || !scale.is_finite() {
        return MAX_LEVEL as i32 + 1;
    }
    let level = (reference_size_metres / scale).log2().ceil();
    level.clamp(i32::MIN as f32, i32::MAX as f32) as i32
}

/// Maps viewer scale to a [`Resolution`]
#[derive(Clone, Debug)]
pub struct ResolutionPicker {
    /// Physical size of one LOD 0 tile at the equator, in metres
    reference_size_metres: f32,
    /// Scale (metres per pixel) below which live meshes may engage
    live_threshold: f32,
    /// Levels the catalog has imagery for
    levels: LevelSet,
}

impl ResolutionPicker {
    pub fn new(levels: LevelSet) -> Self {
        Self {
            reference_size_metres: EQUATOR_DEGREE_METRES,
            live_threshold: DEFAULT_LIVE_THRESHOLD,
            levels,
        }
    }

    pub fn with_reference_size(mut self, metres: f32) -> Self {
        self.reference_size_metres = metres;
        self
    }

    pub fn with_live_threshold(mut self, metres_per_pixel: f32) -> Self {
        self.live_threshold = metres_per_pixel;
        self
    }

    pub fn levels(&self) -> LevelSet {
        self.levels
    }

    pub fn set_levels(&mut self, levels: LevelSet) {
        self.levels = levels;
    }

    pub fn reference_size_metres(&self) -> f32 {
        self.reference_size_metres
    }

    pub fn live_threshold(&self) -> f32 {
        self.live_threshold
    }

    /// Pick the imagery level and live-mesh flag for `scale`
    pub fn pick(&self, scale: f32) -> Resolution {
        let ideal = ideal_level(self.reference_size_metres, scale);
        let start = ideal.clamp(0, MAX_LEVEL as i32 + 1) as u32;

        if let Some(level) = self.levels.nearest_at_or_above(start) {
            return Resolution {
                level: Some(level),
                live_needed: false,
            };
        }

        // Nothing fine enough: fall back to the finest coarser level and let
        // live meshes take over once imagery would look too blurry
        Resolution {
            level: self.levels.nearest_at_or_below(start),
            live_needed: scale < self.live_threshold,
        }
    }
}
