#![allow(clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gatekeeper_admission::{
    CacheConfig, FixedWindowLimiter, IdentityCache, RateLimitConfig, testutil::PipelineFixture,
};
use gatekeeper_storage::{MemoryBackend, UserId, testutil::identity_with_level};
use tokio::runtime::Runtime;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rt() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime")
}

fn make_key(idx: usize) -> String {
    format!("10.0.{}.{}", idx / 256, idx % 256)
}

/// A limiter large enough that benchmark iterations are never rejected.
fn generous_limiter() -> FixedWindowLimiter {
    FixedWindowLimiter::new(RateLimitConfig::new(u64::MAX, Duration::from_secs(3600)))
}

// ---------------------------------------------------------------------------
// 1. limiter_permit
// ---------------------------------------------------------------------------

fn limiter_permit(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_permit");
    group.throughput(Throughput::Elements(1));

    // -- one hot key --
    let limiter = generous_limiter();
    group.bench_function("hot_key", |b| {
        b.iter(|| limiter.permit("10.0.0.1"));
    });

    // -- rotating over many keys --
    for &keys in &[100usize, 10_000] {
        let limiter = generous_limiter();
        let names: Vec<String> = (0..keys).map(make_key).collect();
        let mut i = 0;
        group.bench_with_input(BenchmarkId::new("rotating_keys", keys), &keys, |b, _| {
            b.iter(|| {
                i = (i + 1) % names.len();
                limiter.permit(&names[i])
            });
        });
    }

    // -- rejected path --
    let limiter = FixedWindowLimiter::new(RateLimitConfig::new(1, Duration::from_secs(3600)));
    limiter.permit("exhausted");
    group.bench_function("rejected", |b| {
        b.iter(|| limiter.permit("exhausted"));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. limiter_purge
// ---------------------------------------------------------------------------

fn limiter_purge(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_purge");

    for &keys in &[1_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, &keys| {
            b.iter_batched(
                || {
                    let limiter = generous_limiter();
                    for i in 0..keys {
                        limiter.permit(&make_key(i));
                    }
                    limiter
                },
                |limiter| limiter.purge_expired(),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. identity_cache
// ---------------------------------------------------------------------------

fn identity_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_cache");
    let rt = rt();

    let cache = rt.block_on(async {
        IdentityCache::new(Arc::new(MemoryBackend::new()), &CacheConfig::default())
    });
    let identity = identity_with_level(1, 5);
    rt.block_on(async { cache.set(&identity).await.expect("populate set failed") });

    group.bench_function("get_hit", |b| {
        b.iter(|| rt.block_on(cache.get(UserId(1))).expect("get failed"));
    });
    group.bench_function("get_miss", |b| {
        b.iter(|| rt.block_on(cache.get(UserId(2))).expect("get failed"));
    });
    group.bench_function("set", |b| {
        b.iter(|| rt.block_on(cache.set(&identity)).expect("set failed"));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 4. pipeline_admit
// ---------------------------------------------------------------------------

fn pipeline_admit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_admit");
    let rt = rt();

    let fx = rt.block_on(PipelineFixture::with_rate_limit(u64::MAX, Duration::from_secs(3600)));
    let unscoped = fx.request_as(fx.user.id);
    let scoped = fx.request_as(fx.user.id).for_resource(fx.admin.id, "user");

    group.bench_function("unscoped", |b| {
        b.iter(|| rt.block_on(fx.pipeline.admit(&unscoped)));
    });
    group.bench_function("role_scoped", |b| {
        b.iter(|| rt.block_on(fx.pipeline.admit(&scoped)));
    });

    group.finish();
}

criterion_group!(benches, limiter_permit, limiter_purge, identity_cache, pipeline_admit);
criterion_main!(benches);
