//! Storage Module
//!
//! This module provides the core storage functionality: a sharded
//! key-value map, an index of keys by expiry second, and a background
//! sweeper that drains that index as seconds elapse.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Storage                             │
//! │  ┌──────────────────────────┐  ┌──────────────────────────┐ │
//! │  │  primary: ShardedMap     │  │  ttl: TtlIndex           │ │
//! │  │  key -> Entry            │  │  second -> [key, ...]    │ │
//! │  │  (RwLock per shard)      │  │  (Mutex per bucket)      │ │
//! │  └──────────────────────────┘  └──────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use ttlkv::storage::Storage;
//! use ttlkv::{Ttl, Value};
//! use std::time::Duration;
//!
//! let storage = Storage::new(16, false).unwrap();
//!
//! storage.set("name", "Ariz", Ttl::Never);
//! assert_eq!(storage.get("name"), Some(Value::from("Ariz")));
//!
//! // Removed by the sweeper once the hour has passed
//! storage.set("session", "token123", Duration::from_secs(3600));
//! assert!(storage.expires_at("session").is_some());
//! ```

pub mod engine;
pub mod expiry;
pub mod shard;
pub mod ttl;

// Re-export commonly used types
pub use engine::{Entry, Storage, StorageStats};
pub use expiry::ExpirySweeper;
pub use shard::ShardedMap;
pub use ttl::{Ttl, TtlBucket, TtlIndex};
