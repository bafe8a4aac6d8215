//! Basic benchmarks for the `unit_pool` package.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::thread;

use criterion::{Criterion, criterion_group, criterion_main};
use unit_pool::UnitPool;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const UNIT_LENGTH: usize = 1024;
const UNIT_AMOUNT: usize = 64;
const RECORD: [u8; UNIT_LENGTH] = [0xAB; UNIT_LENGTH];

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("up_lifecycle");

    group.bench_function("create_close", |b| {
        b.iter(|| {
            let pool = UnitPool::new(UNIT_LENGTH, UNIT_AMOUNT).unwrap();
            pool.close().unwrap();
        });
    });

    group.bench_function("branch_close", |b| {
        let root = UnitPool::new(UNIT_LENGTH, UNIT_AMOUNT).unwrap();

        b.iter(|| {
            let branch = root.branch("bench", UNIT_AMOUNT).unwrap();
            branch.close().unwrap();
        });
    });

    group.finish();

    let mut group = c.benchmark_group("up_round_trip");

    group.bench_function("root", |b| {
        let pool = UnitPool::new(UNIT_LENGTH, UNIT_AMOUNT).unwrap();
        let mut buf = [0_u8; UNIT_LENGTH];

        b.iter(|| {
            pool.write(black_box(&RECORD)).unwrap();
            black_box(pool.read(&mut buf).unwrap());
        });
    });

    group.bench_function("branch", |b| {
        let root = UnitPool::new(UNIT_LENGTH, UNIT_AMOUNT).unwrap();
        let branch = root.branch("bench", UNIT_AMOUNT).unwrap();
        let mut buf = [0_u8; UNIT_LENGTH];

        b.iter(|| {
            branch.write(black_box(&RECORD)).unwrap();
            black_box(branch.read(&mut buf).unwrap());
        });
    });

    group.bench_function("fill_then_drain", |b| {
        let pool = UnitPool::new(UNIT_LENGTH, UNIT_AMOUNT).unwrap();
        let mut buf = [0_u8; UNIT_LENGTH];

        b.iter(|| {
            for _ in 0..UNIT_AMOUNT {
                pool.write(black_box(&RECORD)).unwrap();
            }
            for _ in 0..UNIT_AMOUNT {
                black_box(pool.read(&mut buf).unwrap());
            }
        });
    });

    group.finish();

    let mut group = c.benchmark_group("up_threads");

    group.bench_function("producer_consumer_1000", |b| {
        b.iter(|| {
            let root = UnitPool::new(UNIT_LENGTH, UNIT_AMOUNT).unwrap();
            let branch = root.branch("pipe", UNIT_AMOUNT / 2).unwrap();

            let producer = thread::spawn({
                let branch = branch.clone();
                move || {
                    for _ in 0..1000 {
                        branch.write(&RECORD).unwrap();
                    }
                }
            });

            let mut buf = [0_u8; UNIT_LENGTH];
            for _ in 0..1000 {
                black_box(branch.read(&mut buf).unwrap());
            }

            producer.join().unwrap();
            root.close().unwrap();
        });
    });

    group.finish();
}
