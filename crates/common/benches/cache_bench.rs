//! Cache benchmarks
//!
//! Benchmarks for set/get, eviction under both policies, and pattern
//! invalidation.
//!
//! Run with: `cargo bench --bench cache_bench -p repolink-common`

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use repolink_common::cache::{Cache, CacheConfig, EvictionPolicy};

fn bench_cache_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_set");

    for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu] {
        for size in [100, 1000, 10_000] {
            group.throughput(Throughput::Elements(1));
            group.bench_with_input(
                BenchmarkId::new(format!("{policy:?}"), size),
                &size,
                |b, &size| {
                    let config = CacheConfig::builder()
                        .max_size(size)
                        .eviction_policy(policy)
                        .default_ttl(Duration::from_secs(60))
                        .build();
                    let cache: Cache<String, u64> = Cache::new(config);
                    let mut counter = 0u64;
                    b.iter(|| {
                        cache.set(black_box(format!("key_{counter}")), black_box(counter), None);
                        counter = counter.wrapping_add(1);
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_cache_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get_hit");

    for size in [100, 1000, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("lru", size), &size, |b, &size| {
            let cache: Cache<String, u64> = Cache::new(CacheConfig::lru(size));
            let keys: Vec<String> = (0..size as u64).map(|i| format!("key_{i}")).collect();
            for (i, key) in keys.iter().enumerate() {
                cache.set(key.clone(), i as u64, None);
            }
            let mut counter = 0usize;
            b.iter(|| {
                let key = &keys[counter % keys.len()];
                let _ = black_box(cache.get(black_box(key)));
                counter = counter.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_invalidate_pattern(c: &mut Criterion) {
    c.bench_function("invalidate_pattern_1000", |b| {
        let cache: Cache<String, u64> = Cache::new(CacheConfig::lru(2000));
        b.iter(|| {
            for i in 0..500u64 {
                cache.set(format!("GET:/content/site/{i}"), i, None);
                cache.set(format!("GET:/content/dam/{i}"), i, None);
            }
            black_box(cache.invalidate_pattern("GET:/content/site/*"));
        });
    });
}

criterion_group!(benches, bench_cache_set, bench_cache_get_hit, bench_invalidate_pattern);
criterion_main!(benches);
