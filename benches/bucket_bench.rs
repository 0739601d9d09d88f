use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use slot_bucket::Bucket;
use std::thread;
use std::time::Duration;

const CAP: usize = 100_000;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn filled(cap: usize) -> Bucket<u64> {
    let b = Bucket::with_capacity(cap);
    for i in 0..cap {
        b.insert(i, i as u64);
    }
    b
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket::insert");
    group.throughput(Throughput::Elements(CAP as u64));
    group.bench_function("fresh_100k", |b| {
        b.iter_batched(
            || Bucket::<u64>::with_capacity(CAP),
            |m| {
                for i in 0..CAP {
                    m.insert(i, i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("occupied_100k", |b| {
        b.iter_batched(
            || filled(CAP),
            |m| {
                for i in 0..CAP {
                    black_box(m.insert(i, 0));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_ops(c: &mut Criterion) {
    let m = filled(CAP);
    let mut idx = lcg(7).map(|x| (x >> 33) as usize % CAP);
    c.bench_function("bucket::try_get_hit", |b| {
        b.iter(|| black_box(m.try_get(idx.next().unwrap())))
    });
    c.bench_function("bucket::exchange", |b| {
        b.iter(|| black_box(m.exchange(idx.next().unwrap(), 1)))
    });
    c.bench_function("bucket::update", |b| {
        b.iter(|| black_box(m.update(idx.next().unwrap(), |v| v + 1, |_| true)))
    });
    c.bench_function("bucket::remove_then_insert", |b| {
        b.iter(|| {
            let i = idx.next().unwrap();
            black_box(m.take_at(i));
            black_box(m.insert(i, 2));
        })
    });
}

fn bench_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket::iter");
    let dense = filled(CAP);
    group.throughput(Throughput::Elements(CAP as u64));
    group.bench_function("dense_100k", |b| {
        b.iter(|| black_box(dense.iter().fold(0u64, u64::wrapping_add)))
    });
    let sparse = Bucket::<u64>::with_capacity(CAP);
    for x in lcg(11).take(1_000) {
        sparse.insert((x >> 33) as usize % CAP, x);
    }
    group.bench_function("sparse_1k_of_100k", |b| {
        b.iter(|| black_box(sparse.iter().count()))
    });
    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket::contended");
    for threads in [2usize, 4, 8] {
        group.bench_function(format!("set_remove_{threads}t"), |b| {
            let m = Bucket::<u64>::with_capacity(1_024);
            b.iter(|| {
                thread::scope(|s| {
                    for t in 0..threads {
                        let m = &m;
                        s.spawn(move || {
                            for x in lcg(t as u64 + 1).take(10_000) {
                                let i = (x >> 33) as usize % 1_024;
                                if x & 1 == 0 {
                                    m.set(i, x);
                                } else {
                                    m.remove_at(i);
                                }
                            }
                        });
                    }
                });
            })
        });
    }
    group.finish();
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_ops, bench_iter, bench_contended
}
criterion_main!(benches);
