//! Sharded Concurrent Map
//!
//! A string-keyed map split into independently locked shards. Keys are
//! distributed across shards with a hash function, so callers touching
//! different shards never contend.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ShardedMap<V>                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no ordering between shards: `keys()` and `len()` visit the
//! shards one after another and may observe writes that race with them.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug)]
struct Shard<V> {
    data: RwLock<HashMap<String, V>>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    // A panic while holding the lock cannot leave a HashMap half-updated,
    // so a poisoned shard is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A concurrent map from `String` keys to `V`, partitioned into shards.
#[derive(Debug)]
pub struct ShardedMap<V> {
    shards: Vec<Shard<V>>,
}

impl<V> ShardedMap<V> {
    /// Creates a map with `shard_count` shards.
    ///
    /// A count of zero is bumped to one; callers validate their
    /// configuration before getting here.
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| Shard::new()).collect();
        Self { shards }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    #[inline]
    fn get_shard(&self, key: &str) -> &Shard<V> {
        &self.shards[self.shard_index(key)]
    }

    /// Inserts `value` under `key`, returning the previous value.
    pub fn put(&self, key: String, value: V) -> Option<V> {
        self.get_shard(&key).write().insert(key, value)
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.get_shard(key).write().remove(key)
    }

    /// Removes `key` only if `predicate` holds for its current value.
    ///
    /// The check and the removal happen under one shard lock.
    pub fn remove_if<F>(&self, key: &str, predicate: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut data = self.get_shard(key).write();
        match data.get(key) {
            Some(value) if predicate(value) => data.remove(key),
            _ => None,
        }
    }

    /// Returns true if `key` is present.
    pub fn exists(&self, key: &str) -> bool {
        self.get_shard(key).read().contains_key(key)
    }

    /// Runs `f` against the value under `key` while holding the shard's
    /// read lock.
    pub fn with<R, F>(&self, key: &str, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        self.get_shard(key).read().get(key).map(f)
    }

    /// Runs `f` against a mutable reference to the value under `key`
    /// while holding the shard's write lock.
    pub fn with_mut<R, F>(&self, key: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.get_shard(key).write().get_mut(key).map(f)
    }

    /// Returns a snapshot of all keys, visiting one shard at a time.
    pub fn keys(&self) -> Vec<String> {
        let mut result = Vec::new();
        for shard in &self.shards {
            result.extend(shard.read().keys().cloned());
        }
        result
    }

    /// Returns the number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Returns true if no shard holds an entry.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

impl<V: Clone> ShardedMap<V> {
    /// Returns a clone of the value under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.with(key, V::clone)
    }
}
