//! Distance-prioritised, budgeted cache with a time-sliced tick
//!
//! One scheduling cycle is `reset(focus)`, then `add()` for every object the
//! caller currently wants, then `go()`. After that the host calls `tick()`
//! whenever the previous tick asked to be re-armed. Each tick first evicts
//! unrequested objects (farthest first) while the resident total is over
//! budget, then loads requested objects (nearest first) until its time slice
//! runs out.
//!
//! Requested objects are never evicted, so the budget is soft: if the
//! requested set alone is larger than the budget the cache stays above it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::time::Clock;
use crate::core::types::Vec3;
use super::budget::ByteBudget;
use super::cacheable::{CacheStore, Cacheable};
use super::priority::{Scheduled, sort_farthest_first, sort_nearest_first};

/// Scalar knobs for a [`Cache`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Soft limit on resident bytes. 0 = unlimited.
    pub budget_bytes: usize,
    /// Longest a tick may keep loading, in microseconds
    pub tick_budget_micros: u64,
    /// Delay before a re-armed tick, in milliseconds
    pub tick_interval_millis: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 256 * 1024 * 1024, // 256 MB
            tick_budget_micros: 10_000,
            tick_interval_millis: 16,
        }
    }
}

impl CacheConfig {
    pub fn tick_budget(&self) -> Duration {
        Duration::from_micros(self.tick_budget_micros)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_millis)
    }
}

/// What the host should do after a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickStatus {
    /// Nothing left to do until the next `go()`
    Idle,
    /// Call `tick()` again after this delay
    Rearm(Duration),
}

/// Counters for logging and tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Ticks run, including ones that found stale work
    pub ticks: u64,
    /// `step_load` calls
    pub load_steps: u64,
    /// `step_unload` calls
    pub unload_steps: u64,
    /// Objects that finished unloading and left the resident set
    pub evicted: u64,
}

#[derive(Clone, Copy, Debug)]
struct ResidentEntry {
    /// Distance from the focus of the current cycle
    distance: f32,
    /// Not requested in the current cycle
    unload_eligible: bool,
    /// Bytes this object contributed to the budget after its last step
    size: usize,
}

/// Scheduler for a set of [`Cacheable`] objects addressed by key
pub struct Cache<K> {
    config: CacheConfig,
    /// Everything at least partially loaded
    resident: HashMap<K, ResidentEntry>,
    /// Nearest first
    pending_load: VecDeque<Scheduled<K>>,
    /// Farthest first
    pending_unload: VecDeque<Scheduled<K>>,
    /// Keys already in `pending_load` this cycle
    queued: HashSet<K>,
    budget: ByteBudget,
    focus: Vec3,
    /// Between `go()` and the next `reset()`
    active: bool,
    /// A tick is outstanding with the host
    armed: bool,
    stats: CacheStats,
}

impl<K> Cache<K>
where
    K: Clone + Eq + Hash + Debug,
{
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `config` - Budget and tick timing; `budget_bytes == 0` disables eviction
    pub fn new(config: CacheConfig) -> Self {
        let budget = ByteBudget::new(config.budget_bytes);
        Self {
            config,
            resident: HashMap::new(),
            pending_load: VecDeque::new(),
            pending_unload: VecDeque::new(),
            queued: HashSet::new(),
            budget,
            focus: Vec3::ZERO,
            active: false,
            armed: false,
            stats: CacheStats::default(),
        }
    }

    /// Start a new cycle around `focus`
    ///
    /// Every resident object gets a fresh distance and becomes eligible for
    /// unloading. Both queues are dropped. Nothing is evicted here, except
    /// that objects missing from `store` leave the resident set and their
    /// bytes leave the budget.
    ///
    /// # Arguments
    /// * `focus` - Viewer position distances are measured from
    /// * `store` - Registry the keys resolve in
    pub fn reset<S>(&mut self, focus: Vec3, store: &S)
    where
        S: CacheStore<K>,
    {
        self.focus = focus;
        self.active = false;
        self.pending_load.clear();
        self.pending_unload.clear();
        self.queued.clear();

        let mut stale = Vec::new();
        for (key, entry) in self.resident.iter_mut() {
            match store.object(key) {
                Some(object) => {
                    entry.distance = object.distance_to(focus);
                    entry.unload_eligible = true;
                }
                None => stale.push(key.clone()),
            }
        }
        for key in stale {
            log::warn!("Cache: dropping {:?}, no longer in the registry", key);
            self.forget(&key);
        }
    }

    /// Request an object for the current cycle
    ///
    /// Must be called between `reset()` and `go()`. A call after `go()` panics
    /// in debug builds and is logged and ignored in release builds.
    ///
    /// # Arguments
    /// * `key` - Object to keep; it is never evicted during this cycle
    /// * `store` - Registry the key resolves in
    /// * `ctx` - Passed to `Cacheable::should_enter`
    pub fn add<S>(&mut self, key: K, store: &mut S, ctx: &<S::Object as Cacheable>::Context)
    where
        S: CacheStore<K>,
    {
        debug_assert!(!self.active, "Cache::add({:?}) called after go() without reset()", key);
        if self.active {
            log::warn!("Cache: ignoring add({:?}) after go() without reset()", key);
            return;
        }

        let Some(object) = store.object_mut(&key) else {
            log::warn!("Cache: add({:?}) for an object not in the registry", key);
            return;
        };

        let distance = object.distance_to(self.focus);
        if let Some(entry) = self.resident.get_mut(&key) {
            entry.unload_eligible = false;
            entry.distance = distance;
        }

        if self.queued.contains(&key) {
            return;
        }
        if object.should_enter(ctx) {
            self.queued.insert(key.clone());
            self.pending_load.push_back(Scheduled::new(key, distance));
        }
    }

    /// Close the cycle and start ticking
    ///
    /// Queues every still-eligible resident object for unloading, sorts both
    /// queues and arms the tick. The host should call [`Cache::tick`] until
    /// it reports [`TickStatus::Idle`].
    pub fn go(&mut self) {
        for (key, entry) in &self.resident {
            if entry.unload_eligible {
                self.pending_unload.push_back(Scheduled::new(key.clone(), entry.distance));
            }
        }
        sort_nearest_first(&mut self.pending_load);
        sort_farthest_first(&mut self.pending_unload);

        self.active = true;
        self.armed = true;

        log::debug!(
            "Cache: go with {} to load, {} unload candidates, {} resident ({} / {} bytes)",
            self.pending_load.len(),
            self.pending_unload.len(),
            self.resident.len(),
            self.budget.used(),
            self.budget.limit(),
        );
    }

    /// Run one time slice of scheduling work
    ///
    /// `clock` bounds the loading phase to `tick_budget`. At least one load
    /// step runs per tick so progress is guaranteed even with a zero budget.
    ///
    /// # Arguments
    /// * `store` - Registry the queued keys resolve in
    /// * `ctx` - Passed to `Cacheable::step_load`
    /// * `clock` - Time source for the slice deadline
    ///
    /// # Returns
    /// `Rearm(delay)` while work remains, `Idle` once done or after a `reset()`
    pub fn tick<S, C>(
        &mut self,
        store: &mut S,
        ctx: &<S::Object as Cacheable>::Context,
        clock: &C,
    ) -> TickStatus
    where
        S: CacheStore<K>,
        C: Clock + ?Sized,
    {
        self.stats.ticks += 1;

        // A reset() since the last go() makes any outstanding work stale
        if !self.active {
            self.armed = false;
            return TickStatus::Idle;
        }

        self.unload_over_budget(store);

        if self.pending_load.is_empty() {
            return self.finish_tick();
        }

        let start = clock.now();
        let tick_budget = self.config.tick_budget();
        while self.active {
            let Some(front) = self.pending_load.front() else {
                break;
            };
            let key = front.key.clone();
            let distance = front.distance;

            let Some(object) = store.object_mut(&key) else {
                log::warn!("Cache: dropping {:?}, no longer in the registry", key);
                self.pending_load.pop_front();
                self.forget(&key);
                continue;
            };

            let before = object.resident_size();
            let done = object.step_load(ctx);
            let after = object.resident_size();
            self.budget.adjust(before, after);
            self.stats.load_steps += 1;

            // Resident from the first step on, so partial loads are accounted
            // for and seen by the next reset()
            self.resident
                .entry(key)
                .or_insert(ResidentEntry {
                    distance,
                    unload_eligible: false,
                    size: 0,
                })
                .size = after;

            if done {
                self.pending_load.pop_front();
            }

            if clock.now().saturating_duration_since(start) > tick_budget {
                break;
            }
        }

        self.finish_tick()
    }

    /// Evict farthest unrequested objects until under budget
    fn unload_over_budget<S>(&mut self, store: &mut S)
    where
        S: CacheStore<K>,
    {
        while self.active && self.budget.is_over() {
            let Some(front) = self.pending_unload.front() else {
                break;
            };
            let key = front.key.clone();

            let Some(object) = store.object_mut(&key) else {
                log::warn!("Cache: dropping {:?}, no longer in the registry", key);
                self.pending_unload.pop_front();
                self.forget(&key);
                continue;
            };

            let before = object.resident_size();
            let done = object.step_unload();
            let after = object.resident_size();
            self.budget.adjust(before, after);
            self.stats.unload_steps += 1;

            if !done {
                if let Some(entry) = self.resident.get_mut(&key) {
                    entry.size = after;
                }
                // Resume on the next tick
                break;
            }

            self.pending_unload.pop_front();
            self.resident.remove(&key);
            self.stats.evicted += 1;
            log::debug!(
                "Cache: evicted {:?} ({} bytes freed, {} / {} resident)",
                key,
                before.saturating_sub(after),
                self.budget.used(),
                self.budget.limit(),
            );
        }
    }

    fn finish_tick(&mut self) -> TickStatus {
        let unload_work = self.budget.is_over() && !self.pending_unload.is_empty();

        log::trace!(
            "Cache: tick {} done, {} to load, {} unload candidates, {} bytes resident",
            self.stats.ticks,
            self.pending_load.len(),
            self.pending_unload.len(),
            self.budget.used(),
        );

        if self.pending_load.is_empty() && !unload_work {
            // Under budget with nothing left to load: the remaining unload
            // candidates stay resident and are reconsidered on the next go()
            self.pending_unload.clear();
            self.armed = false;
            TickStatus::Idle
        } else {
            self.armed = true;
            TickStatus::Rearm(self.config.tick_interval())
        }
    }

    /// Remove every trace of an object that vanished from the registry
    ///
    /// It can no longer be unloaded, so its last known size is written off.
    fn forget(&mut self, key: &K) {
        if let Some(entry) = self.resident.remove(key) {
            self.budget.remove(entry.size);
        }
        self.queued.remove(key);
        self.pending_load.retain(|s| &s.key != key);
        self.pending_unload.retain(|s| &s.key != key);
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Change the budget; takes effect on the next tick
    pub fn set_budget_bytes(&mut self, budget_bytes: usize) {
        self.config.budget_bytes = budget_bytes;
        self.budget.set_limit(budget_bytes);
    }

    pub fn budget(&self) -> &ByteBudget {
        &self.budget
    }

    /// Bytes held by resident objects
    pub fn resident_bytes(&self) -> usize {
        self.budget.used()
    }

    pub fn focus(&self) -> Vec3 {
        self.focus
    }

    /// True between `go()` and the next `reset()`
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True while the host owes the cache another tick
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_resident(&self, key: &K) -> bool {
        self.resident.contains_key(key)
    }

    pub fn resident_len(&self) -> usize {
        self.resident.len()
    }

    pub fn resident_keys(&self) -> impl Iterator<Item = &K> {
        self.resident.keys()
    }

    pub fn pending_load_len(&self) -> usize {
        self.pending_load.len()
    }

    pub fn pending_unload_len(&self) -> usize {
        self.pending_unload.len()
    }

    /// Keys waiting to load, nearest first
    pub fn pending_load_keys(&self) -> impl Iterator<Item = &K> {
        self.pending_load.iter().map(|s| &s.key)
    }

    /// Keys waiting to unload, farthest first
    pub fn pending_unload_keys(&self) -> impl Iterator<Item = &K> {
        self.pending_unload.iter().map(|s| &s.key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Object with `parts` load steps of `part_size` bytes each
    struct Fake {
        name: &'static str,
        position: Vec3,
        parts: usize,
        part_size: usize,
        loaded: usize,
        wants: bool,
        step_cost: Duration,
        clock: Option<Rc<ManualClock>>,
        log: Log,
    }

    impl Fake {
        fn new(name: &'static str, x: f32, log: &Log) -> Self {
            Self {
                name,
                position: Vec3::new(x, 0.0, 0.0),
                parts: 1,
                part_size: 1,
                loaded: 0,
                wants: true,
                step_cost: Duration::ZERO,
                clock: None,
                log: Rc::clone(log),
            }
        }

        fn parts(mut self, parts: usize) -> Self {
            self.parts = parts;
            self
        }
    }

    impl Cacheable for Fake {
        type Context = ();

        fn distance_to(&self, focus: Vec3) -> f32 {
            self.position.distance(focus)
        }

        fn should_enter(&mut self, _: &()) -> bool {
            self.wants && self.loaded < self.parts
        }

        fn step_load(&mut self, _: &()) -> bool {
            self.log.borrow_mut().push(format!("load {}", self.name));
            if let Some(clock) = &self.clock {
                clock.advance(self.step_cost);
            }
            self.loaded = (self.loaded + 1).min(self.parts);
            self.loaded == self.parts
        }

        fn step_unload(&mut self) -> bool {
            self.log.borrow_mut().push(format!("unload {}", self.name));
            self.loaded = 0;
            true
        }

        fn resident_size(&self) -> usize {
            self.loaded * self.part_size
        }
    }

    fn new_log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn config(budget_bytes: usize) -> CacheConfig {
        CacheConfig {
            budget_bytes,
            tick_budget_micros: 10_000,
            tick_interval_millis: 16,
        }
    }

    fn run_until_idle<S>(cache: &mut Cache<&'static str>, store: &mut S, clock: &ManualClock) -> usize
    where
        S: CacheStore<&'static str, Object = Fake>,
    {
        let mut ticks = 0;
        while cache.is_armed() {
            cache.tick(store, &(), clock);
            ticks += 1;
            assert!(ticks < 10_000, "cache never went idle");
        }
        ticks
    }

    /// Put already-loaded objects into the resident set
    fn make_resident(cache: &mut Cache<&'static str>, store: &mut HashMap<&'static str, Fake>, clock: &ManualClock) {
        for object in store.values_mut() {
            object.loaded = 0;
        }
        cache.reset(Vec3::ZERO, store);
        let mut keys: Vec<_> = store.keys().copied().collect();
        keys.sort();
        for key in keys {
            cache.add(key, store, &());
        }
        cache.go();
        run_until_idle(cache, store, clock);
    }

    #[test]
    fn test_loads_nearest_first() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("ten", Fake::new("ten", 10.0, &log));
        store.insert("one", Fake::new("one", 1.0, &log));
        store.insert("five", Fake::new("five", 5.0, &log));

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        for key in ["ten", "five", "one"] {
            cache.add(key, &mut store, &());
        }
        cache.go();

        assert_eq!(cache.pending_load_keys().copied().collect::<Vec<_>>(), ["one", "five", "ten"]);
        cache.tick(&mut store, &(), &clock);
        assert_eq!(log.borrow()[0], "load one");
        assert_eq!(*log.borrow(), ["load one", "load five", "load ten"]);
        assert_eq!(cache.resident_len(), 3);
        assert_eq!(cache.resident_bytes(), 3);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 1.0, &log));
        store.insert("b", Fake::new("b", 2.0, &log));

        let mut cache = Cache::new(config(0));
        make_resident(&mut cache, &mut store, &clock);
        assert_eq!(cache.resident_len(), 2);

        cache.reset(Vec3::new(3.0, 0.0, 0.0), &store);
        cache.reset(Vec3::new(3.0, 0.0, 0.0), &store);

        assert_eq!(cache.resident_len(), 2);
        assert!(cache.is_resident(&"a") && cache.is_resident(&"b"));
        assert_eq!(cache.pending_load_len(), 0);
        assert_eq!(cache.pending_unload_len(), 0);
        assert_eq!(cache.resident_bytes(), 2);
    }

    #[test]
    fn test_evicts_farthest_first() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 50.0, &log));
        store.insert("b", Fake::new("b", 5.0, &log));
        store.insert("c", Fake::new("c", 40.0, &log));

        let mut cache = Cache::new(config(0));
        make_resident(&mut cache, &mut store, &clock);
        assert_eq!(cache.resident_bytes(), 3);
        log.borrow_mut().clear();

        // Only B is requested, and only B fits
        cache.set_budget_bytes(1);
        cache.reset(Vec3::ZERO, &store);
        cache.add("b", &mut store, &());
        cache.go();

        assert_eq!(cache.pending_unload_keys().copied().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(cache.tick(&mut store, &(), &clock), TickStatus::Idle);
        assert_eq!(*log.borrow(), ["unload a", "unload c"]);
        assert!(cache.is_resident(&"b"));
        assert_eq!(cache.resident_bytes(), 1);
        assert_eq!(cache.stats().evicted, 2);
    }

    #[test]
    fn test_eviction_stops_at_budget() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 50.0, &log));
        store.insert("c", Fake::new("c", 40.0, &log));
        store.insert("b", Fake::new("b", 5.0, &log));

        let mut cache = Cache::new(config(3));
        make_resident(&mut cache, &mut store, &clock);
        assert_eq!(cache.resident_bytes(), 3);
        // B now has a second part to fetch
        store.get_mut("b").unwrap().parts = 2;
        log.borrow_mut().clear();

        // B wants its second part, which pushes the total to 4 > 3
        cache.reset(Vec3::ZERO, &store);
        cache.add("b", &mut store, &());
        cache.go();

        // First tick: under budget, loads B
        assert!(matches!(cache.tick(&mut store, &(), &clock), TickStatus::Rearm(_)));
        assert_eq!(cache.resident_bytes(), 4);
        // Second tick: over budget, evicts only the farthest
        assert_eq!(cache.tick(&mut store, &(), &clock), TickStatus::Idle);
        assert_eq!(*log.borrow(), ["load b", "unload a"]);
        assert!(cache.is_resident(&"c"));
        assert!(!cache.is_resident(&"a"));
        assert_eq!(cache.resident_bytes(), 3);
    }

    #[test]
    fn test_requested_objects_never_queued_for_unload() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        for (name, x) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            store.insert(name, Fake::new(name, x, &log));
        }

        let mut cache = Cache::new(config(1));
        make_resident(&mut cache, &mut store, &clock);

        cache.reset(Vec3::ZERO, &store);
        cache.add("b", &mut store, &());
        cache.add("d", &mut store, &());
        cache.go();

        let unload: Vec<_> = cache.pending_unload_keys().copied().collect();
        assert!(!unload.contains(&"b") && !unload.contains(&"d"));
        run_until_idle(&mut cache, &mut store, &clock);

        // Budget is smaller than the requested set; both stay resident
        assert!(cache.is_resident(&"b") && cache.is_resident(&"d"));
        assert_eq!(cache.resident_bytes(), 2);
    }

    #[test]
    fn test_tick_respects_time_slice() {
        let log = new_log();
        let clock = Rc::new(ManualClock::new());
        let mut store = HashMap::new();
        for (name, x) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)] {
            let mut object = Fake::new(name, x, &log);
            object.clock = Some(Rc::clone(&clock));
            object.step_cost = Duration::from_millis(6);
            store.insert(name, object);
        }

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        for name in ["e", "d", "c", "b", "a"] {
            cache.add(name, &mut store, &());
        }
        cache.go();

        // 10ms slice, 6ms per step: the second step crosses the deadline
        assert_eq!(cache.tick(&mut store, &(), &*clock), TickStatus::Rearm(Duration::from_millis(16)));
        assert_eq!(*log.borrow(), ["load a", "load b"]);
        assert_eq!(cache.pending_load_len(), 3);

        cache.tick(&mut store, &(), &*clock);
        assert_eq!(cache.tick(&mut store, &(), &*clock), TickStatus::Idle);
        assert_eq!(log.borrow().len(), 5);
    }

    #[test]
    fn test_partial_load_resumes_first() {
        let log = new_log();
        let clock = Rc::new(ManualClock::new());
        let mut store = HashMap::new();
        let mut big = Fake::new("big", 1.0, &log).parts(3);
        big.clock = Some(Rc::clone(&clock));
        big.step_cost = Duration::from_micros(1);
        store.insert("big", big);
        store.insert("small", Fake::new("small", 2.0, &log));

        let mut cache = Cache::new(CacheConfig {
            tick_budget_micros: 0,
            ..config(0)
        });
        cache.reset(Vec3::ZERO, &store);
        cache.add("small", &mut store, &());
        cache.add("big", &mut store, &());
        cache.go();

        // A zero budget still allows one step per tick
        cache.tick(&mut store, &(), &*clock);
        assert!(cache.is_resident(&"big"));
        assert_eq!(cache.resident_bytes(), 1);
        assert_eq!(cache.pending_load_keys().next(), Some(&"big"));

        run_until_idle(&mut cache, &mut store, &clock);
        assert_eq!(*log.borrow(), ["load big", "load big", "load big", "load small"]);
        assert_eq!(cache.resident_bytes(), 4);
    }

    #[test]
    fn test_reset_drops_outstanding_work() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 1.0, &log));

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        cache.add("a", &mut store, &());
        cache.go();
        assert!(cache.is_armed());

        // Viewer moved before the tick fired
        cache.reset(Vec3::ONE, &store);
        assert_eq!(cache.tick(&mut store, &(), &clock), TickStatus::Idle);
        assert!(log.borrow().is_empty());
        assert!(!cache.is_armed());
        assert_eq!(cache.resident_len(), 0);
    }

    #[test]
    fn test_objects_not_wanting_entry_are_skipped() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        let mut idle = Fake::new("idle", 1.0, &log);
        idle.wants = false;
        store.insert("idle", idle);

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        cache.add("idle", &mut store, &());
        cache.go();
        assert_eq!(cache.pending_load_len(), 0);
        assert_eq!(cache.tick(&mut store, &(), &clock), TickStatus::Idle);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_add_queues_once() {
        let log = new_log();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 1.0, &log));

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        cache.add("a", &mut store, &());
        cache.add("a", &mut store, &());
        cache.go();
        assert_eq!(cache.pending_load_len(), 1);
    }

    #[test]
    fn test_missing_objects_are_forgotten() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 1.0, &log));
        store.insert("b", Fake::new("b", 2.0, &log));

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        cache.add("a", &mut store, &());
        cache.add("b", &mut store, &());
        cache.go();

        // Registry rebuilt under the cache
        store.remove("a");
        run_until_idle(&mut cache, &mut store, &clock);
        assert!(!cache.is_resident(&"a"));
        assert!(cache.is_resident(&"b"));
        assert_eq!(*log.borrow(), ["load b"]);
    }

    #[test]
    fn test_budget_converges_over_many_cycles() {
        let log = new_log();
        let clock = ManualClock::new();
        let names: [&'static str; 12] = [
            "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10", "t11",
        ];
        let mut store = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            store.insert(*name, Fake::new(name, i as f32 * 3.0, &log).parts(1 + i % 3));
        }

        let budget = 8;
        let mut cache = Cache::new(config(budget));
        let mut seed: u32 = 12345;
        for cycle in 0..40 {
            // Cheap LCG so the sequence is deterministic
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let start = (seed >> 16) as usize % names.len();
            let visible: Vec<_> = (0..3).map(|i| names[(start + i) % names.len()]).collect();
            let visible_size: usize = visible.iter().map(|n| store[n].parts).sum();

            cache.reset(Vec3::new(cycle as f32, 0.0, 0.0), &store);
            for name in &visible {
                cache.add(*name, &mut store, &());
            }
            cache.go();

            let mut last = usize::MAX;
            while cache.is_armed() {
                let remaining = cache.pending_load_len() + cache.pending_unload_len();
                assert!(remaining <= last || last == usize::MAX);
                last = remaining;
                cache.tick(&mut store, &(), &clock);
            }

            let actual: usize = store.values().map(|o| o.resident_size()).sum();
            assert_eq!(cache.resident_bytes(), actual);
            if budget >= visible_size {
                assert!(cache.resident_bytes() <= budget, "cycle {} over budget", cycle);
            }
            for name in &visible {
                assert_eq!(store[name].loaded, store[name].parts);
            }
        }
    }

    #[test]
    fn test_removed_object_bytes_leave_the_budget() {
        let log = new_log();
        let clock = ManualClock::new();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 50.0, &log));
        store.insert("b", Fake::new("b", 5.0, &log));
        store.insert("c", Fake::new("c", 40.0, &log));

        let mut cache = Cache::new(config(0));
        make_resident(&mut cache, &mut store, &clock);
        assert_eq!(cache.resident_bytes(), 3);
        log.borrow_mut().clear();

        // Registry rebuilt without A after A had loaded
        store.remove("a");
        cache.reset(Vec3::ZERO, &store);
        assert!(!cache.is_resident(&"a"));
        let actual: usize = store.values().map(|o| o.resident_size()).sum();
        assert_eq!(cache.resident_bytes(), actual);

        // B and C fit in 2 bytes, so nothing is evicted
        cache.set_budget_bytes(2);
        cache.add("b", &mut store, &());
        cache.go();
        assert_eq!(cache.tick(&mut store, &(), &clock), TickStatus::Idle);
        assert!(log.borrow().is_empty());
        assert!(cache.is_resident(&"b") && cache.is_resident(&"c"));
        assert_eq!(cache.resident_bytes(), 2);
        assert_eq!(cache.stats().evicted, 0);
    }

    #[test]
    fn test_object_removed_mid_cycle_leaves_the_budget() {
        let log = new_log();
        let clock = Rc::new(ManualClock::new());
        let mut store = HashMap::new();
        let mut near = Fake::new("near", 1.0, &log).parts(3);
        near.clock = Some(Rc::clone(&clock));
        near.step_cost = Duration::from_micros(1);
        store.insert("near", near);
        store.insert("far", Fake::new("far", 9.0, &log));

        let mut cache = Cache::new(CacheConfig {
            tick_budget_micros: 0,
            ..config(0)
        });
        cache.reset(Vec3::ZERO, &store);
        cache.add("near", &mut store, &());
        cache.add("far", &mut store, &());
        cache.go();

        // One step per tick: near is partially loaded
        cache.tick(&mut store, &(), &*clock);
        assert!(cache.is_resident(&"near"));
        assert_eq!(cache.resident_bytes(), 1);

        store.remove("near");
        run_until_idle(&mut cache, &mut store, &clock);
        assert!(!cache.is_resident(&"near"));
        assert!(cache.is_resident(&"far"));
        assert_eq!(cache.resident_bytes(), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "without reset")]
    fn test_add_after_go_panics_in_debug() {
        let log = new_log();
        let mut store = HashMap::new();
        store.insert("a", Fake::new("a", 1.0, &log));

        let mut cache = Cache::new(config(0));
        cache.reset(Vec3::ZERO, &store);
        cache.go();
        cache.add("a", &mut store, &());
    }
}
