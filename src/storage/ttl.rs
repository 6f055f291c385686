//! TTL Bucket Index
//!
//! Expiring keys are grouped by the Unix second they expire at. Each group
//! (a "bucket") lives in a [`ShardedMap`] under the decimal string of its
//! second, so the sweeper can visit exactly the seconds that have elapsed
//! instead of scanning every key in the store.
//!
//! ## Locking
//!
//! Two tiers:
//!
//! 1. One creation lock serializes "does bucket X exist, if not create it".
//!    It is only taken when the plain lookup misses.
//! 2. Each bucket has its own lock guarding its key list, so appends to
//!    different seconds never wait on each other.

use crate::storage::shard::ShardedMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifetime requested for an entry on `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// The entry never expires.
    #[default]
    Never,

    /// The entry expires this long from now, rounded down to the second.
    After(Duration),

    /// The entry is deleted immediately; the value passed to `set` is dropped.
    Expired,
}

impl Ttl {
    /// Builds a TTL from a signed millisecond count: negative means
    /// [`Ttl::Expired`], zero means [`Ttl::Never`].
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => Ttl::Expired,
            0 => Ttl::Never,
            ms => Ttl::After(Duration::from_millis(ms.unsigned_abs())),
        }
    }

    /// Same as [`Ttl::from_millis`] for whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            secs if secs < 0 => Ttl::Expired,
            0 => Ttl::Never,
            secs => Ttl::After(Duration::from_secs(secs.unsigned_abs())),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Ttl::Never
        } else {
            Ttl::After(ttl)
        }
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Ttl::Never, Ttl::from)
    }
}

/// Time since the Unix epoch. A clock set before 1970 reads as zero.
fn unix_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// The current Unix second.
pub(crate) fn current_second() -> i64 {
    unix_time().as_secs() as i64
}

/// The second an entry set now with `ttl` expires at: `floor(now + ttl)`.
pub(crate) fn expiry_second(ttl: Duration) -> i64 {
    unix_time().saturating_add(ttl).as_secs() as i64
}

/// Keys scheduled to expire at one particular second.
#[derive(Debug, Default)]
pub struct TtlBucket {
    keys: Mutex<Vec<String>>,
}

impl TtlBucket {
    /// Appends a key under the bucket's own lock.
    pub fn push(&self, key: String) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);
    }

    /// Takes every key out of the bucket.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.keys.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns a copy of the keys currently listed.
    pub fn snapshot(&self) -> Vec<String> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of keys listed, duplicates and stale references included.
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if the bucket lists no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index from expiry second to its bucket.
#[derive(Debug)]
pub struct TtlIndex {
    buckets: ShardedMap<Arc<TtlBucket>>,
    creation_lock: Mutex<()>,
}

impl TtlIndex {
    /// Creates an empty index spread over `shard_count` shards.
    pub fn new(shard_count: usize) -> Self {
        Self {
            buckets: ShardedMap::new(shard_count),
            creation_lock: Mutex::new(()),
        }
    }

    #[inline]
    fn bucket_key(second: i64) -> String {
        second.to_string()
    }

    /// Returns the bucket for `second`, creating it if needed.
    ///
    /// Concurrent callers asking for the same second always get the same
    /// bucket.
    pub fn ensure_bucket(&self, second: i64) -> Arc<TtlBucket> {
        let key = Self::bucket_key(second);
        if let Some(bucket) = self.buckets.get(&key) {
            return bucket;
        }

        let _guard = self
            .creation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Re-check: another caller may have created it while we waited.
        if let Some(bucket) = self.buckets.get(&key) {
            return bucket;
        }
        let bucket = Arc::new(TtlBucket::default());
        self.buckets.put(key, Arc::clone(&bucket));
        bucket
    }

    /// Returns the bucket for `second` if one exists.
    pub fn bucket(&self, second: i64) -> Option<Arc<TtlBucket>> {
        self.buckets.get(&Self::bucket_key(second))
    }

    /// Detaches the bucket for `second` from the index.
    ///
    /// Taken under the creation lock so a concurrent `ensure_bucket` either
    /// sees the old bucket before removal or creates a fresh one after it.
    pub fn remove_bucket(&self, second: i64) -> Option<Arc<TtlBucket>> {
        let _guard = self
            .creation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.buckets.remove(&Self::bucket_key(second))
    }

    /// All seconds that currently have a bucket, ascending.
    pub fn seconds(&self) -> Vec<i64> {
        let mut seconds: Vec<i64> = self
            .buckets
            .keys()
            .iter()
            .filter_map(|key| key.parse().ok())
            .collect();
        seconds.sort_unstable();
        seconds
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true if no bucket exists.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
