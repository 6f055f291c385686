//! Throughput Benchmark for ttlkv
//!
//! Measures the storage facade under plain, TTL'd and concurrent workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use ttlkv::{Storage, Ttl, Value};

fn storage() -> Storage {
    Storage::new(64, false).expect("valid shard count")
}

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let storage = storage();

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_scalar", |b| {
        let mut i = 0u64;
        b.iter(|| {
            storage.set(format!("key:{}", i), i as i64, Ttl::Never);
            i += 1;
        });
    });

    group.bench_function("set_list", |b| {
        let mut i = 0u64;
        let value: Value = (0..32).collect();
        b.iter(|| {
            storage.set(format!("list:{}", i), value.clone(), Ttl::Never);
            i += 1;
        });
    });

    // Every key lands in the same few buckets
    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            storage.set(format!("ttl:{}", i), "value", Duration::from_secs(3600));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET and typed accessor operations
fn bench_get(c: &mut Criterion) {
    let storage = storage();

    for i in 0..100_000 {
        storage.set(format!("key:{}", i), format!("value:{}", i), Ttl::Never);
    }
    let dict: HashMap<String, i64> = (0..64).map(|i| (format!("f{}", i), i)).collect();
    storage.set("dict", dict, Ttl::Never);
    storage.set("list", (0..64).collect::<Value>(), Ttl::Never);

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(storage.get(&format!("key:{}", i % 100_000)));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(storage.get(&format!("missing:{}", i)));
            i += 1;
        });
    });

    group.bench_function("get_list_element", |b| {
        let mut i = 0usize;
        b.iter(|| {
            black_box(storage.get_list_element("list", i % 64).ok());
            i += 1;
        });
    });

    group.bench_function("get_dict_element", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(storage.get_dict_element("dict", &format!("f{}", i % 64)).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let storage = storage();

    for i in 0..10_000 {
        storage.set(format!("key:{}", i), i, Ttl::Never);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                storage.set(format!("new:{}", i), "value", Duration::from_secs(60));
            } else {
                black_box(storage.get(&format!("key:{}", i % 10_000)));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_ttl_set_get", |b| {
        b.iter(|| {
            let storage = Arc::new(storage());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let storage = Arc::clone(&storage);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            storage.set(key.as_str(), i, Duration::from_secs(3600));
                            storage.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(storage.len());
        });
    });

    group.finish();
}

/// Benchmark KEYS snapshot and UPDATE
fn bench_keys(c: &mut Criterion) {
    let storage = storage();

    for i in 0..3_000 {
        storage.set(format!("user:{}", i), "user_data", Ttl::Never);
    }

    let mut group = c.benchmark_group("keys");

    group.bench_function("keys_all", |b| {
        b.iter(|| {
            black_box(storage.keys());
        });
    });

    group.bench_function("update_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(storage.update(&format!("user:{}", i % 3_000), "changed").is_ok());
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_keys,
);

criterion_main!(benches);
