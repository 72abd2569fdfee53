// Hash table engine benchmarks
//
// Insert, lookup and remove throughput of the chained engine at a few
// sizes, with `hashbrown` on the same keys as a reference point. Resizes
// go through an explicit grow fit after every insert, the way the runtime
// drives the engine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hashbrown::HashMap;
use tl_mem::{FitPolicy, HashTable, SystemAllocator, mix_int, one_at_a_time};

fn eq(a: &u64, b: &u64) -> bool {
    a == b
}

fn filled(n: u64) -> HashTable<u64, u64> {
    let mut alloc = SystemAllocator;
    let mut table = HashTable::with_capacity(8, &mut alloc).unwrap();
    for k in 0..n {
        table.insert(mix_int(k), k, k, eq, &mut alloc).unwrap();
        table.fit(FitPolicy::GROW, &mut alloc).unwrap();
    }
    table
}

/// Insert `n` integer keys into a fresh table, growing as needed.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for n in [64u64, 1_024, 16_384] {
        group.bench_with_input(BenchmarkId::new("engine", n), &n, |b, &n| {
            b.iter(|| black_box(filled(n)));
        });
        group.bench_with_input(BenchmarkId::new("hashbrown", n), &n, |b, &n| {
            b.iter(|| {
                let mut map = HashMap::with_capacity(8);
                for k in 0..n {
                    map.insert(k, k);
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

/// Look up every key of a filled table.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for n in [64u64, 1_024, 16_384] {
        let table = filled(n);
        group.bench_with_input(BenchmarkId::new("engine", n), &n, |b, &n| {
            b.iter(|| {
                for k in 0..n {
                    black_box(table.get(mix_int(k), &k, eq));
                }
            });
        });

        let map: HashMap<u64, u64> = (0..n).map(|k| (k, k)).collect();
        group.bench_with_input(BenchmarkId::new("hashbrown", n), &n, |b, &n| {
            b.iter(|| {
                for k in 0..n {
                    black_box(map.get(&k));
                }
            });
        });
    }

    group.finish();
}

/// Remove every key, shrinking after each removal.
fn bench_drain(c: &mut Criterion) {
    c.bench_function("drain_1024", |b| {
        b.iter_batched(
            || filled(1_024),
            |mut table| {
                let mut alloc = SystemAllocator;
                for k in 0..1_024u64 {
                    table.remove(mix_int(k), &k, eq, &mut alloc).unwrap();
                    table.fit(FitPolicy::SHRINK, &mut alloc).unwrap();
                }
                table
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Byte hashing of identifier-sized keys.
fn bench_one_at_a_time(c: &mut Criterion) {
    let names = ["x", "car", "lambda", "string-append", "a-rather-long-identifier-name"];
    c.bench_function("one_at_a_time", |b| {
        b.iter(|| {
            for name in names {
                black_box(one_at_a_time(black_box(name.as_bytes())));
            }
        });
    });
}

criterion_group!(benches, bench_insert, bench_lookup, bench_drain, bench_one_at_a_time);
criterion_main!(benches);
