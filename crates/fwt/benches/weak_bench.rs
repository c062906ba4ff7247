//! FWT Benchmarks
//!
//! Write barrier and teardown costs for inline and out-of-line entries.
//! Run with: `cargo bench --package fwt`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fwt::{WeakRegistry, WeakTableConfig, INLINE_CAPACITY};

const REFERENT_BASE: usize = 0x10_0000_0000;

fn create_registry() -> WeakRegistry {
    WeakRegistry::new(WeakTableConfig::default()).unwrap()
}

fn bench_register_unregister(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_barrier");
    let registry = create_registry();
    let mut slot = 0usize;
    let location = &mut slot as *mut usize as usize;

    group.bench_function("register_unregister_inline", |b| {
        b.iter(|| unsafe {
            registry.register(black_box(REFERENT_BASE), location, true);
            registry.unregister(black_box(REFERENT_BASE), location);
        })
    });

    group.bench_function("duplicate_register", |b| {
        unsafe { registry.register(REFERENT_BASE, location, true) };
        b.iter(|| unsafe { registry.register(black_box(REFERENT_BASE), location, true) });
        registry.unregister(REFERENT_BASE, location);
    });

    group.finish();
}

fn bench_clear(c: &mut Criterion) {
    let mut group = c.benchmark_group("clear");

    for referrers in [1, INLINE_CAPACITY, INLINE_CAPACITY + 1, 64, 1024] {
        group.throughput(Throughput::Elements(referrers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(referrers),
            &referrers,
            |b, &referrers| {
                let registry = create_registry();
                let mut slots = vec![0usize; referrers];
                b.iter(|| {
                    for slot in slots.iter_mut() {
                        *slot = REFERENT_BASE;
                        let location = slot as *mut usize as usize;
                        unsafe { registry.register(REFERENT_BASE, location, true) };
                    }
                    black_box(registry.clear(REFERENT_BASE))
                })
            },
        );
    }

    group.bench_function("miss", |b| {
        let registry = create_registry();
        b.iter(|| black_box(registry.clear(black_box(REFERENT_BASE))))
    });

    group.finish();
}

fn bench_many_referents(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_growth");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("register_10k_referents", |b| {
        let mut slots = vec![0usize; 10_000];
        b.iter(|| {
            let registry = create_registry();
            for (i, slot) in slots.iter_mut().enumerate() {
                let referent = REFERENT_BASE + i * 64;
                *slot = referent;
                unsafe { registry.register(referent, slot as *mut usize as usize, true) };
            }
            black_box(registry.len())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_register_unregister,
    bench_clear,
    bench_many_referents
);
criterion_main!(benches);
