//! Storage Configuration

use crate::error::{Result, StorageError};
use std::time::Duration;

/// Default number of shards for both the data map and the TTL index.
pub const DEFAULT_SHARD_COUNT: usize = 64;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Construction parameters for [`Storage`](crate::Storage).
///
/// # Example
///
/// ```
/// use ttlkv::StorageConfig;
/// use std::time::Duration;
///
/// let config = StorageConfig::default()
///     .with_shard_count(16)
///     .with_sweep_interval(Duration::from_secs(1));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Number of shards (default: 64)
    pub shard_count: usize,

    /// Interval between sweeps (default: 60s)
    pub sweep_interval: Duration,

    /// Start the sweeper as part of construction (default: false)
    pub start_sweeper: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            start_sweeper: false,
        }
    }
}

impl StorageConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of shards for the data map and the TTL index
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// Sets how often the sweeper wakes up.
    ///
    /// Expiry precision can never be finer than this interval: a key with a
    /// 10ms TTL still lives until the next sweep after its second elapses.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets whether construction also starts the background sweeper
    pub fn with_start_sweeper(mut self, start: bool) -> Self {
        self.start_sweeper = start;
        self
    }

    /// Checks that the configuration can build a working store.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(StorageError::InvalidConfig(
                "shard_count must be positive".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(StorageError::InvalidConfig(
                "sweep_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
