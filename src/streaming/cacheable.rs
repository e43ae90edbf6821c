//! Contract between the cache and the objects it schedules

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::core::types::Vec3;

/// Anything the [`Cache`](super::Cache) can load and unload incrementally
///
/// The cache never owns these objects. It addresses them by key through a
/// [`CacheStore`] and only drives their loaded state.
pub trait Cacheable {
    /// Extra state the object reads while deciding and doing its work
    /// (current level of detail, view frustum and so on).
    type Context;

    /// Distance from the focus point. Called once per reset cycle.
    fn distance_to(&self, focus: Vec3) -> f32;

    /// Decide what this object still needs. Must not do I/O.
    ///
    /// Returns true if there is anything to load.
    fn should_enter(&mut self, ctx: &Self::Context) -> bool;

    /// Do one bounded unit of loading. Returns true when nothing more is
    /// needed. Failures count as done.
    fn step_load(&mut self, ctx: &Self::Context) -> bool;

    /// Release loaded resources. Returns true when fully unloaded.
    fn step_unload(&mut self) -> bool;

    /// Bytes currently held. Valid between any two steps.
    fn resident_size(&self) -> usize;
}

/// Registry that owns cacheable objects and resolves keys to them
pub trait CacheStore<K> {
    type Object: Cacheable;

    fn object(&self, key: &K) -> Option<&Self::Object>;

    fn object_mut(&mut self, key: &K) -> Option<&mut Self::Object>;
}

impl<K, V, S> CacheStore<K> for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Cacheable,
    S: BuildHasher,
{
    type Object = V;

    fn object(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn object_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}

impl<K, V> CacheStore<K> for BTreeMap<K, V>
where
    K: Ord,
    V: Cacheable,
{
    type Object = V;

    fn object(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn object_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}
