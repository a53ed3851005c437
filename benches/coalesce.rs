//! Coalescing-pass throughput over dense and scattered region sets.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use coread::region::{coalesce, Region};

fn region_set(count: u64, stride: u64, length: u64) -> Vec<Region> {
    // Reversed so the pass also pays for the sort.
    (0..count)
        .rev()
        .map(|i| Region::new(i * stride, length))
        .collect()
}

fn bench_coalesce(c: &mut Criterion) {
    let dense = region_set(4096, 120, 100);
    let scattered = region_set(4096, 3000, 100);

    c.bench_function("coalesce/dense", |b| {
        b.iter_batched(
            || dense.clone(),
            |mut regions| {
                coalesce(&mut regions, 1024, None);
                regions
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("coalesce/scattered", |b| {
        b.iter_batched(
            || scattered.clone(),
            |mut regions| {
                coalesce(&mut regions, 1024, None);
                regions
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_coalesce);
criterion_main!(benches);
