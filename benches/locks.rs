// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for lock operations.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use graphlock::deadlock::{DeadlockDetector, WaitForGraph};
use graphlock::lock::{LockMode, LockRegistry};
use graphlock::txn::{LockingTxnManager, TxnId};
use std::sync::Arc;

fn bench_read_uncontended(c: &mut Criterion) {
    let registry: LockRegistry<u64, u32> = LockRegistry::new();

    c.bench_function("lock::read_acquire_release", |b| {
        b.iter(|| {
            registry.acquire(black_box(&1), LockMode::Read, &1).unwrap();
            registry.release(black_box(&1), LockMode::Read, &1).unwrap();
        })
    });
}

fn bench_reentrant_write(c: &mut Criterion) {
    let registry: LockRegistry<u64, u32> = LockRegistry::new();
    // Keep one hold so the lock is never evicted between iterations
    registry.acquire(&1, LockMode::Write, &1).unwrap();

    c.bench_function("lock::reentrant_write", |b| {
        b.iter(|| {
            registry.acquire(black_box(&1), LockMode::Write, &1).unwrap();
            registry.release(black_box(&1), LockMode::Write, &1).unwrap();
        })
    });
}

fn bench_shared_readers(c: &mut Criterion) {
    let registry: LockRegistry<u64, u32> = LockRegistry::new();
    for owner in 0..64 {
        registry.acquire(&1, LockMode::Read, &owner).unwrap();
    }

    c.bench_function("lock::read_with_64_readers", |b| {
        b.iter(|| {
            registry.acquire(&1, LockMode::Read, black_box(&100)).unwrap();
            registry.release(&1, LockMode::Read, black_box(&100)).unwrap();
        })
    });
}

fn bench_wait_for_check(c: &mut Criterion) {
    let graph: WaitForGraph<u64, u32> = WaitForGraph::new();
    // Chain of 100 owners, each waiting on the resource held by the next
    for owner in 0..100u32 {
        graph.lock_acquired(&owner, &(owner as u64));
    }
    for owner in 0..99u32 {
        graph.check_wait_on(&owner, &(owner as u64 + 1)).unwrap();
    }

    c.bench_function("deadlock::check_chain_100", |b| {
        b.iter(|| {
            let result = graph.check_wait_on(black_box(&99), &0);
            black_box(result)
        })
    });
}

fn bench_txn_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("txn_commit");

    for num_locks in [1u64, 10, 100] {
        group.throughput(Throughput::Elements(num_locks));
        group.bench_function(format!("locks_{}", num_locks), |b| {
            let registry: Arc<LockRegistry<u64, TxnId>> = Arc::new(LockRegistry::new());
            let mgr = LockingTxnManager::new(registry);

            b.iter_batched(
                || {
                    let mut txn = mgr.begin();
                    for resource in 0..num_locks {
                        mgr.lock(&mut txn, resource, LockMode::Write).unwrap();
                    }
                    txn
                },
                |mut txn| {
                    mgr.commit(&mut txn).unwrap();
                    black_box(txn)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_read_uncontended,
    bench_reentrant_write,
    bench_shared_readers,
    bench_wait_for_check,
    bench_txn_commit,
);

criterion_main!(benches);
