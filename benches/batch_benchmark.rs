use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bounded_batch::{run_batch, run_batch_detached, BatchExecutor};
use tokio::runtime::Runtime;

fn ready_tasks(
    n: u64,
) -> impl Iterator<Item = impl FnOnce() -> std::future::Ready<Result<u64, std::io::Error>>> {
    (0..n).map(|i| move || std::future::ready(Ok(i * 2)))
}

fn yielding_tasks(
    n: u64,
) -> Vec<impl FnOnce() -> futures::future::BoxFuture<'static, Result<u64, std::io::Error>>> {
    use futures::FutureExt;

    (0..n)
        .map(|i| {
            move || {
                async move {
                    tokio::task::yield_now().await;
                    Ok(i)
                }
                .boxed()
            }
        })
        .collect()
}

fn benchmark_inline_batches(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("run_batch");

    for limit in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::new("ready_1000", limit), &limit, |b, &limit| {
            b.iter(|| rt.block_on(async { black_box(run_batch(ready_tasks(1000), limit).await) }))
        });

        group.bench_with_input(BenchmarkId::new("yielding_1000", limit), &limit, |b, &limit| {
            b.iter(|| rt.block_on(async { black_box(run_batch(yielding_tasks(1000), limit).await) }))
        });
    }

    group.finish();
}

fn benchmark_spawned_batches(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("run_batch_detached_yielding_1000", |b| {
        b.iter(|| rt.block_on(async { black_box(run_batch_detached(yielding_tasks(1000), 16).await) }))
    });

    let executor = BatchExecutor::new().with_concurrency_limit(16);
    c.bench_function("executor_with_stats_yielding_1000", |b| {
        b.iter(|| rt.block_on(async { black_box(executor.execute_with_stats(yielding_tasks(1000)).await) }))
    });
}

criterion_group!(benches, benchmark_inline_batches, benchmark_spawned_batches);
criterion_main!(benches);
