//! # ttlkv - An Embedded Concurrent Cache with TTL Buckets
//!
//! ttlkv is an in-process key-value cache meant to be shared between the
//! threads and tasks of a host application. Values are typed, keys are
//! spread over independently locked shards, and expiring keys are indexed
//! by the second they expire at so a background sweeper can remove them
//! without scanning the whole store.
//!
//! ## Features
//!
//! - **Sharded Storage**: N independent `RwLock` shards reduce contention
//! - **Typed Values**: scalars, lists, dicts and raw bytes with typed accessors
//! - **TTL Buckets**: keys grouped by expiry second, one lock per bucket
//! - **Background Sweeper**: a Tokio task with synchronous, joinable shutdown
//!
//! ## Quick Start
//!
//! ```no_run
//! use ttlkv::{Storage, StorageConfig, Ttl};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ttlkv::StorageError> {
//!     let storage = Storage::with_config(
//!         StorageConfig::default()
//!             .with_sweep_interval(Duration::from_secs(1))
//!             .with_start_sweeper(true),
//!     )?;
//!
//!     storage.set("greeting", "hello", Duration::from_secs(5));
//!     storage.set("config", vec![1, 2, 3], Ttl::Never);
//!
//!     let second = storage.get_list_element("config", 1)?;
//!     println!("{:?}", second);
//!
//!     storage.stop_sweeper().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Expiry Semantics
//!
//! A key set with a TTL is scheduled for `floor(now + ttl)`. Reads do not
//! check expiry; the key disappears on the first sweep after that second
//! has fully elapsed. Expiry precision is therefore bounded by the sweep
//! interval, never by the requested TTL.
//!
//! ## Module Overview
//!
//! - [`storage`]: the storage facade, sharded map, TTL index and sweeper
//! - [`value`]: the stored value types
//! - [`config`]: construction parameters
//! - [`error`]: the error taxonomy

pub mod config;
pub mod error;
pub mod storage;
pub mod value;

// Re-export commonly used types for convenience
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use storage::{Storage, StorageStats, Ttl};
pub use value::{Scalar, Value, ValueKind};

/// Version of ttlkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
