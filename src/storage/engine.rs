//! Thread-Safe Storage Facade with TTL Buckets
//!
//! This module implements [`Storage`], the handle host applications share
//! between threads. It coordinates two sharded maps:
//!
//! - the primary map, from key to [`Entry`];
//! - the [`TtlIndex`], from expiry second to the keys expiring then.
//!
//! ## Expiry Model
//!
//! Reads never check expiry. A key stays readable until the background
//! sweeper reaches its second, so expiry precision is bounded by the sweep
//! interval rather than by the requested TTL.
//!
//! Each entry remembers the second it is scheduled for. Re-setting a key
//! leaves its old bucket untouched; when the sweeper later drains that
//! bucket it skips the key because the entry now points at a different
//! second (or at none).
//!
//! ```text
//!   set("a", v, 2s) at t=100.4
//!        │
//!        ├──> primary:  "a" -> Entry { v, expires_at: Some(102) }
//!        └──> ttl:      "102" -> ["a"]
//!
//!   sweep at t=103.x  (cutoff = 102)
//!        └──> drain "102", remove "a" if it still expires at 102
//! ```

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::storage::expiry::ExpirySweeper;
use crate::storage::shard::ShardedMap;
use crate::storage::ttl::{current_second, expiry_second, Ttl, TtlIndex};
use crate::value::{Value, ValueKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A stored value together with the second it is scheduled to expire at.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The actual value stored
    pub value: Value,
    /// Expiry second (None = never expires)
    pub expires_at: Option<i64>,
}

impl Entry {
    fn new(value: Value, expires_at: Option<i64>) -> Self {
        Self { value, expires_at }
    }
}

/// Snapshot of storage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Keys currently in the primary map
    pub keys: usize,
    /// Live TTL buckets
    pub buckets: usize,
    /// Keys removed by the sweeper since construction
    pub expired: u64,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepReport {
    /// New value for the sweeper's `last_cleared`
    pub last_cleared: i64,
    /// Buckets found and removed
    pub buckets: usize,
    /// Keys removed from the primary map
    pub removed: u64,
}

/// State shared between callers and the sweeper task.
#[derive(Debug)]
pub(crate) struct Shared {
    data: ShardedMap<Entry>,
    ttl: TtlIndex,
    expired_count: AtomicU64,
}

impl Shared {
    fn new(shard_count: usize) -> Self {
        Self {
            data: ShardedMap::new(shard_count),
            ttl: TtlIndex::new(shard_count),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Removes every key scheduled for a second in `(last_cleared, cutoff]`.
    ///
    /// Seconds are processed in increasing order. A drained key is only
    /// removed if its entry is still scheduled for the bucket's second;
    /// keys that were removed, made permanent or re-scheduled are skipped.
    pub(crate) fn sweep(&self, last_cleared: i64, cutoff: i64) -> SweepReport {
        if cutoff <= last_cleared {
            if cutoff < last_cleared {
                warn!(last_cleared, cutoff, "Clock moved backwards, skipping sweep");
            }
            return SweepReport {
                last_cleared,
                buckets: 0,
                removed: 0,
            };
        }

        // After a long pause the range can dwarf the number of buckets;
        // walk the live buckets instead of every second in that case.
        let span = cutoff.saturating_sub(last_cleared);
        let seconds: Vec<i64> = if span as u64 > self.ttl.len() as u64 {
            self.ttl
                .seconds()
                .into_iter()
                .filter(|s| *s > last_cleared && *s <= cutoff)
                .collect()
        } else {
            ((last_cleared + 1)..=cutoff).collect()
        };

        let mut buckets = 0;
        let mut removed = 0u64;

        for second in seconds {
            let Some(bucket) = self.ttl.remove_bucket(second) else {
                continue;
            };
            buckets += 1;

            let mut removed_here = 0u64;
            for key in bucket.drain() {
                if self
                    .data
                    .remove_if(&key, |entry| entry.expires_at == Some(second))
                    .is_some()
                {
                    removed_here += 1;
                }
            }
            trace!(second, removed = removed_here, "Swept TTL bucket");
            removed += removed_here;
        }

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }

        SweepReport {
            last_cleared: cutoff,
            buckets,
            removed,
        }
    }
}

/// Lifecycle of the background sweeper.
#[derive(Debug)]
enum SweeperState {
    /// Not running; the next start resumes after `last_cleared`.
    Stopped { last_cleared: i64 },
    Running(ExpirySweeper),
    /// A stop is waiting for the task to exit.
    Stopping,
}

/// Leaves the sweeper `Stopped` when a stop finishes or is abandoned.
struct StopGuard<'a> {
    state: &'a Mutex<SweeperState>,
    resume_from: i64,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SweeperState::Stopped {
            last_cleared: self.resume_from,
        };
    }
}

/// The in-process key-value cache.
///
/// All operations take `&self` and are safe to call from many threads at
/// once; wrap the storage in an `Arc` to share it.
///
/// # Example
///
/// ```
/// use ttlkv::{Storage, Ttl, Value};
/// use std::time::Duration;
///
/// let storage = Storage::new(16, false).unwrap();
///
/// storage.set("name", "Ariz", Ttl::Never);
/// assert_eq!(storage.get("name"), Some(Value::from("Ariz")));
///
/// storage.set("session", "abc123", Duration::from_secs(60));
/// storage.set("list", vec![1, 2, 3], Ttl::Never);
/// assert_eq!(storage.get_list_element("list", 1), Ok(Value::from(2)));
/// ```
pub struct Storage {
    shared: Arc<Shared>,
    sweeper: Mutex<SweeperState>,
    sweep_interval: Duration,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("shards", &self.shared.data.shard_count())
            .field("keys", &self.shared.data.len())
            .field("buckets", &self.shared.ttl.len())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl Storage {
    /// Creates a storage with `shard_count` shards and the default sweep
    /// interval, optionally starting the sweeper right away.
    ///
    /// Starting the sweeper requires a Tokio runtime.
    pub fn new(shard_count: usize, start_sweeper: bool) -> Result<Self> {
        Self::with_config(
            StorageConfig::default()
                .with_shard_count(shard_count)
                .with_start_sweeper(start_sweeper),
        )
    }

    /// Creates a storage from a full configuration.
    pub fn with_config(config: StorageConfig) -> Result<Self> {
        config.validate()?;

        let storage = Self {
            shared: Arc::new(Shared::new(config.shard_count)),
            // Anything set from now on lands at the current second or later.
            sweeper: Mutex::new(SweeperState::Stopped {
                last_cleared: current_second() - 1,
            }),
            sweep_interval: config.sweep_interval,
        };
        debug!(
            shards = config.shard_count,
            sweep_interval_ms = config.sweep_interval.as_millis() as u64,
            "Storage initialized"
        );

        if config.start_sweeper {
            storage.start_sweeper()?;
        }
        Ok(storage)
    }

    fn sweeper_state(&self) -> MutexGuard<'_, SweeperState> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// - [`Ttl::After`]: the key is scheduled for removal at
    ///   `floor(now + ttl)`.
    /// - [`Ttl::Never`] (or a zero duration): the entry is permanent.
    /// - [`Ttl::Expired`]: the key is removed now and `value` is dropped.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, ttl: impl Into<Ttl>) {
        let key = key.into();
        match ttl.into() {
            Ttl::Expired => {
                self.shared.data.remove(&key);
            }
            Ttl::After(ttl) if !ttl.is_zero() => {
                let second = expiry_second(ttl);
                self.shared
                    .data
                    .put(key.clone(), Entry::new(value.into(), Some(second)));
                self.shared.ttl.ensure_bucket(second).push(key);
            }
            Ttl::Never | Ttl::After(_) => {
                self.shared.data.put(key, Entry::new(value.into(), None));
            }
        }
    }

    /// Replaces the value of an existing key, keeping its expiry.
    ///
    /// Returns [`StorageError::NotFound`] if the key is absent; nothing is
    /// written in that case.
    pub fn update(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.shared
            .data
            .with_mut(key, |entry| entry.value = value)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Removes a key, returning its value.
    ///
    /// Returns [`StorageError::NotFound`] if the key was absent. TTL buckets
    /// that still list the key are left for the sweeper, which ignores them.
    pub fn remove(&self, key: &str) -> Result<Value> {
        self.shared
            .data
            .remove(key)
            .map(|entry| entry.value)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Returns a copy of the value under `key`.
    ///
    /// No expiry check is made: a key whose second has passed stays visible
    /// until the next sweep.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shared.data.with(key, |entry| entry.value.clone())
    }

    /// Returns true if `key` is present.
    pub fn exists(&self, key: &str) -> bool {
        self.shared.data.exists(key)
    }

    /// Returns element `index` of the list stored under `key`.
    pub fn get_list_element(&self, key: &str, index: usize) -> Result<Value> {
        self.shared
            .data
            .with(key, |entry| match &entry.value {
                Value::List(items) => {
                    items
                        .get(index)
                        .cloned()
                        .ok_or_else(|| StorageError::OutOfBounds {
                            key: key.to_string(),
                            index,
                            len: items.len(),
                        })
                }
                _ => Err(StorageError::WrongType {
                    key: key.to_string(),
                    expected: ValueKind::List,
                }),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?
    }

    /// Returns the element under `dict_key` of the dict stored under `key`.
    pub fn get_dict_element(&self, key: &str, dict_key: &str) -> Result<Value> {
        self.shared
            .data
            .with(key, |entry| match &entry.value {
                Value::Dict(map) => {
                    map.get(dict_key)
                        .cloned()
                        .ok_or_else(|| StorageError::DictKeyNotFound {
                            key: key.to_string(),
                            dict_key: dict_key.to_string(),
                        })
                }
                _ => Err(StorageError::WrongType {
                    key: key.to_string(),
                    expected: ValueKind::Dict,
                }),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?
    }

    /// Returns all keys, in no particular order.
    ///
    /// Shards are read one at a time, so keys written concurrently may or
    /// may not show up.
    pub fn keys(&self) -> Vec<String> {
        self.shared.data.keys()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.shared.data.len()
    }

    /// Returns true if the storage holds no keys.
    pub fn is_empty(&self) -> bool {
        self.shared.data.is_empty()
    }

    /// Returns the second `key` is scheduled to expire at, if any.
    pub fn expires_at(&self, key: &str) -> Option<i64> {
        self.shared.data.with(key, |entry| entry.expires_at).flatten()
    }

    /// Returns the keys listed in the TTL bucket for `second`.
    ///
    /// The list may include keys that were since removed or re-scheduled.
    pub fn ttl_bucket(&self, second: i64) -> Option<Vec<String>> {
        self.shared.ttl.bucket(second).map(|bucket| bucket.snapshot())
    }

    /// Returns every second that currently has a TTL bucket, ascending.
    pub fn ttl_seconds(&self) -> Vec<i64> {
        self.shared.ttl.seconds()
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.shared.data.len(),
            buckets: self.shared.ttl.len(),
            expired: self.shared.expired_count.load(Ordering::Relaxed),
        }
    }

    /// The configured sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Returns true while the background sweeper is running.
    pub fn is_sweeper_running(&self) -> bool {
        matches!(*self.sweeper_state(), SweeperState::Running(_))
    }

    /// Starts the background sweeper on the current Tokio runtime.
    ///
    /// A restarted sweeper resumes after the last second the previous one
    /// cleared, so expirations due while it was stopped are honored on its
    /// first pass.
    ///
    /// # Errors
    ///
    /// - [`StorageError::SweeperAlreadyRunning`] if running or stopping.
    /// - [`StorageError::NoRuntime`] outside a Tokio runtime.
    pub fn start_sweeper(&self) -> Result<()> {
        let mut state = self.sweeper_state();
        let last_cleared = match &*state {
            SweeperState::Stopped { last_cleared } => *last_cleared,
            SweeperState::Running(_) | SweeperState::Stopping => {
                return Err(StorageError::SweeperAlreadyRunning)
            }
        };

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| StorageError::NoRuntime)?;
        let sweeper = ExpirySweeper::start(
            &runtime,
            Arc::clone(&self.shared),
            self.sweep_interval,
            last_cleared,
        );
        *state = SweeperState::Running(sweeper);

        info!(
            interval_ms = self.sweep_interval.as_millis() as u64,
            last_cleared, "Background expiry sweeper started"
        );
        Ok(())
    }

    /// Stops the background sweeper and waits for its task to exit.
    ///
    /// A sweep pass in progress always completes before the task exits.
    /// Dropping the returned future early still leaves the sweeper stopped
    /// and restartable; the task then exits on its own.
    ///
    /// # Errors
    ///
    /// - [`StorageError::SweeperNotRunning`] if not running.
    /// - [`StorageError::SweeperTaskFailed`] if the task panicked. The
    ///   sweeper is still considered stopped and can be restarted.
    pub async fn stop_sweeper(&self) -> Result<()> {
        let sweeper = {
            let mut state = self.sweeper_state();
            match std::mem::replace(&mut *state, SweeperState::Stopping) {
                SweeperState::Running(sweeper) => sweeper,
                other => {
                    *state = other;
                    return Err(StorageError::SweeperNotRunning);
                }
            }
        };

        // If this future is dropped mid-await, the guard puts the state back
        // to Stopped. The dropped sweeper handle still signals the task.
        let mut guard = StopGuard {
            state: &self.sweeper,
            resume_from: sweeper.started_from(),
        };
        let (last_cleared, result) = match sweeper.stop().await {
            Ok(last_cleared) => (last_cleared, Ok(())),
            Err(err) => (guard.resume_from, Err(err)),
        };
        guard.resume_from = last_cleared;
        drop(guard);

        info!(last_cleared, "Background expiry sweeper stopped");
        result
    }

    #[cfg(test)]
    pub(crate) fn sweep_through(&self, last_cleared: i64, cutoff: i64) -> SweepReport {
        self.shared.sweep(last_cleared, cutoff)
    }
}
