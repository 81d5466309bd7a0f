//! Reentrancy guard benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flowguard_bench::harness::{enter_nested, held_guard, runtime, NESTING_DEPTHS};
use flowguard_core::{FlowContext, ReentrancyGuard};

fn bench_enter_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("guard/enter");

    group.bench_function("uncontended", |b| {
        let guard = ReentrancyGuard::new();
        let flow = FlowContext::new();

        b.iter(|| {
            let token = guard.enter(&flow).unwrap();
            black_box(&token);
        });
    });

    group.bench_function("rejected", |b| {
        let (guard, _holder) = held_guard();
        let flow = FlowContext::new();

        b.iter(|| {
            black_box(guard.enter(&flow).unwrap_err());
        });
    });

    group.bench_function("current_flow", |b| {
        let guard = ReentrancyGuard::new();

        b.iter(|| {
            let token = guard.enter(&FlowContext::current()).unwrap();
            black_box(&token);
        });
    });

    group.finish();
}

fn bench_nesting(c: &mut Criterion) {
    let mut group = c.benchmark_group("guard/nesting");

    for depth in NESTING_DEPTHS {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let guard = ReentrancyGuard::new();
            let flow = FlowContext::new();

            b.iter(|| {
                let tokens = enter_nested(&guard, &flow, depth).unwrap();
                black_box(tokens.len());
            });
        });
    }

    group.finish();
}

fn bench_async_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("guard/async");
    let rt = runtime();

    group.bench_function("uncontended", |b| {
        let guard = ReentrancyGuard::new();
        let flow = FlowContext::new();

        b.to_async(&rt).iter(|| async {
            let token = guard.enter_async(&flow).await.unwrap();
            black_box(&token);
        });
    });

    group.bench_function("scoped_reentry", |b| {
        let guard = ReentrancyGuard::new();

        b.to_async(&rt).iter(|| {
            FlowContext::new().scope(async {
                let outer = guard.enter_async(&FlowContext::current()).await.unwrap();
                let inner = guard.enter(&FlowContext::current()).unwrap();
                black_box((&outer, &inner));
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_enter_release, bench_nesting, bench_async_admission);
criterion_main!(benches);
