//! Real-clock expiry scenarios.
//!
//! These run the sweeper on a one-second interval against the wall clock,
//! so each test takes a few seconds.

use std::sync::Arc;
use std::time::Duration;
use ttlkv::{Storage, StorageConfig, Ttl, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn storage_with_interval(interval: Duration) -> anyhow::Result<Storage> {
    Ok(Storage::with_config(
        StorageConfig::default()
            .with_shard_count(10)
            .with_sweep_interval(interval),
    )?)
}

#[tokio::test]
async fn test_ttl_bounded_by_sweep_interval() -> anyhow::Result<()> {
    init_tracing();
    let storage = storage_with_interval(Duration::from_secs(1))?;
    storage.start_sweeper()?;

    storage.set("t1", 1, Duration::from_millis(10));
    storage.set("t2", 2, Duration::from_secs(2));
    storage.set("t3", 3, Duration::from_secs(2));

    assert_eq!(storage.get("t1"), Some(Value::from(1)));
    assert_eq!(storage.get("t2"), Some(Value::from(2)));

    // t1's second has elapsed and been swept; t2's has not.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(storage.get("t1"), None);
    assert_eq!(storage.get("t2"), Some(Value::from(2)));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(storage.get("t1"), None);
    assert_eq!(storage.get("t2"), None);
    assert_eq!(storage.get("t3"), None);

    storage.stop_sweeper().await?;
    Ok(())
}

#[tokio::test]
async fn test_refreshed_key_outlives_old_expiry() -> anyhow::Result<()> {
    init_tracing();
    let storage = storage_with_interval(Duration::from_millis(200))?;
    storage.start_sweeper()?;

    storage.set("session", "v1", Duration::from_millis(10));
    storage.set("session", "v2", Duration::from_secs(60));
    storage.set("pinned", "v1", Duration::from_millis(10));
    storage.set("pinned", "v2", Ttl::Never);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(storage.get("session"), Some(Value::from("v2")));
    assert_eq!(storage.get("pinned"), Some(Value::from("v2")));
    assert_eq!(storage.stats().expired, 0);

    storage.stop_sweeper().await?;
    Ok(())
}

#[tokio::test]
async fn test_update_does_not_extend_expiry() -> anyhow::Result<()> {
    init_tracing();
    let storage = storage_with_interval(Duration::from_millis(200))?;
    storage.start_sweeper()?;

    storage.set("key", 1, Duration::from_millis(10));
    storage.update("key", 2)?;
    assert_eq!(storage.get("key"), Some(Value::from(2)));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(storage.get("key"), None);
    assert!(storage.update("key", 3).is_err());

    storage.stop_sweeper().await?;
    Ok(())
}

#[tokio::test]
async fn test_stop_and_restart_keeps_schedule() -> anyhow::Result<()> {
    init_tracing();
    let storage = storage_with_interval(Duration::from_millis(200))?;

    storage.start_sweeper()?;
    storage.set("before", 1, Duration::from_millis(10));
    storage.stop_sweeper().await?;
    assert!(!storage.is_sweeper_running());

    storage.set("during", 2, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(2200)).await;

    // Nothing expires while stopped
    assert!(storage.exists("before"));
    assert!(storage.exists("during"));

    storage.start_sweeper()?;
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!storage.exists("before"));
    assert!(!storage.exists("during"));

    storage.stop_sweeper().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_with_sweeper() -> anyhow::Result<()> {
    init_tracing();
    let storage = Arc::new(storage_with_interval(Duration::from_millis(100))?);
    storage.start_sweeper()?;

    let mut handles = vec![];
    for i in 0..8 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::task::spawn_blocking(move || {
            for j in 0..500 {
                let key = format!("w{}-{}", i, j);
                storage.set(key.as_str(), j, Ttl::Never);
                storage.set(key.as_str(), i * 10_000 + j, Duration::from_secs(3600));
                let short = format!("s{}-{}", i, j);
                storage.set(short, j, Duration::from_millis(1));
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    tokio::time::sleep(Duration::from_millis(2300)).await;

    // Short-lived keys are gone, long-lived ones kept their last write.
    assert_eq!(storage.len(), 8 * 500);
    for i in 0..8 {
        for j in 0..500 {
            let key = format!("w{}-{}", i, j);
            assert_eq!(storage.get(&key), Some(Value::from(i * 10_000 + j)));
        }
    }
    assert_eq!(storage.stats().expired, 8 * 500);

    storage.stop_sweeper().await?;
    Ok(())
}
