//! Benches `QueryCache` directly rather than `QueryEngine::semantic_search`,
//! which would need a live `EmbeddingClient` (a real fastembed model load) to
//! exercise — the same live-model avoidance the rest of this codebase's test
//! suites follow.

use codegraph_query::cache::QueryCache;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_set(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("cache_set", |b| {
        let cache = QueryCache::new(300);
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            rt.block_on(cache.set(format!("query:callers:project:P1:function:F{i}"), serde_json::json!({"v": i})));
        });
    });
}

fn bench_get_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = QueryCache::new(300);
    rt.block_on(cache.set("query:callers:project:P1:function:F1", serde_json::json!({"a": 1})));

    c.bench_function("cache_get_hit", |b| {
        b.iter(|| {
            let value = rt.block_on(cache.get(black_box("query:callers:project:P1:function:F1")));
            black_box(value);
        });
    });
}

fn bench_invalidate_project(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("cache_invalidate_project_1000_keys", |b| {
        b.iter_batched(
            || {
                let cache = QueryCache::new(300);
                for i in 0..1000 {
                    let project = if i % 2 == 0 { "P1" } else { "P2" };
                    rt.block_on(cache.set(format!("query:callers:project:{project}:function:F{i}"), serde_json::json!(i)));
                }
                cache
            },
            |cache| {
                let deleted = rt.block_on(cache.invalidate_project("P1"));
                black_box(deleted);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_set, bench_get_hit, bench_invalidate_project);
criterion_main!(benches);
