//! Bounded in-process memo
//!
//! Keeps resolved [`GeneContext`]s and GO term lists so repeated requests
//! skip the upstream lookups. When full, the entry touched longest ago goes.
//!
//! [`GeneContext`]: crate::gene::GeneContext

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries held right now
    pub entries: usize,
    pub capacity: usize,
    /// Entries dropped to make room
    pub evictions: u64,
}

struct Slot<V> {
    value: V,
    last_used: u64,
}

struct Slots<K, V> {
    map: HashMap<K, Slot<V>>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Hash + Eq + Clone, V> Slots<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn oldest(&self) -> Option<K> {
        self.map
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone())
    }
}

/// Least-recently-used map shared across tasks
pub struct LruCache<K, V> {
    slots: Mutex<Slots<K, V>>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// `capacity` is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Mutex::new(Slots {
                map: HashMap::with_capacity(capacity),
                clock: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<K, V>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut slots = self.lock();
        let now = slots.tick();
        let found = slots.map.get_mut(key).map(|slot| {
            slot.last_used = now;
            slot.value.clone()
        });
        match found {
            Some(_) => slots.hits += 1,
            None => slots.misses += 1,
        }
        found
    }

    pub fn insert(&self, key: K, value: V) {
        let mut slots = self.lock();
        let last_used = slots.tick();
        if !slots.map.contains_key(&key) && slots.map.len() >= self.capacity {
            if let Some(oldest) = slots.oldest() {
                slots.map.remove(&oldest);
                slots.evictions += 1;
            }
        }
        slots.map.insert(key, Slot { value, last_used });
    }

    /// Drop the entries whose key matches; returns how many went
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut slots = self.lock();
        let before = slots.map.len();
        slots.map.retain(|key, _| !predicate(key));
        before - slots.map.len()
    }

    pub fn clear(&self) -> usize {
        let mut slots = self.lock();
        let removed = slots.map.len();
        slots.map.clear();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.lock();
        CacheStats {
            hits: slots.hits,
            misses: slots.misses,
            entries: slots.map.len(),
            capacity: self.capacity,
            evictions: slots.evictions,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
