use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ruapc_bytepool::BufferPool;

const SLOT_CAPACITY: usize = 4 * 1024;
const TOTAL_CAPACITY: usize = 1024;

/// Single-threaded claim/release against a pool, a saturated pool and `Vec`.
fn benchmark_get_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("Get/Put");
    group.throughput(Throughput::Elements(1));

    let pool = BufferPool::new(SLOT_CAPACITY, TOTAL_CAPACITY, 8).unwrap();
    group.bench_function("pooled", |b| {
        b.iter(|| {
            let mut buffer = pool.get();
            buffer.push(black_box(1)).unwrap();
            pool.put(buffer);
        });
    });

    let saturated = BufferPool::new(SLOT_CAPACITY, 16, 1).unwrap();
    let _held: Vec<_> = (0..16).map(|_| saturated.get()).collect();
    group.bench_function("fallback", |b| {
        b.iter(|| {
            let mut buffer = saturated.get();
            buffer.push(black_box(1)).unwrap();
            saturated.put(buffer);
        });
    });

    group.bench_function("vec_baseline", |b| {
        b.iter(|| {
            let mut vec = Vec::<u8>::with_capacity(SLOT_CAPACITY);
            vec.push(black_box(1));
            black_box(vec);
        });
    });

    group.finish();
}

/// Contended claim/release from several threads sharing one pool.
fn benchmark_contended(c: &mut Criterion) {
    let threads = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
    let mut group = c.benchmark_group("Contended Get/Put");
    group.sample_size(20);

    for shards in [1, threads.max(2)] {
        let pool = Arc::new(BufferPool::new(SLOT_CAPACITY, TOTAL_CAPACITY, shards).unwrap());
        group.bench_function(format!("{threads}_threads_{shards}_shards"), |b| {
            b.iter(|| {
                std::thread::scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            for _ in 0..1000 {
                                let mut buffer = pool.get();
                                buffer.push(1).unwrap();
                                pool.put(buffer);
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_get_put, benchmark_contended);
criterion_main!(benches);
