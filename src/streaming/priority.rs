//! Distance-keyed scheduling entries

use std::cmp::Ordering;
use std::collections::VecDeque;

/// A queued object and its distance from the focus point
#[derive(Clone, Copy, Debug)]
pub struct Scheduled<K> {
    pub key: K,
    pub distance: f32,
}

impl<K> Scheduled<K> {
    pub fn new(key: K, distance: f32) -> Self {
        Self { key, distance }
    }
}

// Ordering only looks at distance. total_cmp keeps NaN from breaking sorts.
impl<K> PartialEq for Scheduled<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for Scheduled<K> {}

impl<K> Ord for Scheduled<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

impl<K> PartialOrd for Scheduled<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort so the nearest entry is at the front. Ties keep insertion order.
pub fn sort_nearest_first<K>(queue: &mut VecDeque<Scheduled<K>>) {
    queue.make_contiguous().sort();
}

/// Sort so the farthest entry is at the front. Ties keep insertion order.
pub fn sort_farthest_first<K>(queue: &mut VecDeque<Scheduled<K>>) {
    queue.make_contiguous().sort_by(|a, b| b.cmp(a));
}
