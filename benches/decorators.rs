use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use timing_decorators::infrastructure::mocks::{MockClock, MockTimer};
use timing_decorators::{memoize, memoize_by, once, Throttle};

/// Benchmark the cached path of `once`
fn bench_once(c: &mut Criterion) {
    let mut group = c.benchmark_group("once");

    let init = once(|n: u64| n.pow(3));
    init.call(7);

    group.bench_function("cached_call", |b| b.iter(|| *init.call(black_box(11))));

    group.finish();
}

/// Benchmark memoize hits and misses
fn bench_memoize(c: &mut Criterion) {
    let mut group = c.benchmark_group("memoize");

    let square = memoize(|n: u64| n * n);
    for n in 0..1_000 {
        square.call(n);
    }

    group.bench_function("hit", |b| b.iter(|| square.call(black_box(512))));

    group.bench_function("miss", |b| {
        let mut n = 1_000u64;
        b.iter(|| {
            n += 1;
            square.call(black_box(n))
        })
    });

    group.bench_function("string_key", |b| {
        let lookup = memoize_by(|s: &&str| s.to_string(), |s: &str| s.len());
        lookup.call("service.endpoint.latency");
        b.iter(|| lookup.call(black_box("service.endpoint.latency")))
    });

    group.finish();
}

/// Benchmark memoize hits from several threads
fn bench_memoize_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("memoize_concurrent");

    for num_threads in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*num_threads as u64 * 1_000));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let square = Arc::new(memoize(|n: u64| n * n));
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let square = Arc::clone(&square);
                            thread::spawn(move || {
                                for n in 0..1_000u64 {
                                    black_box(square.call(n % 64));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

/// Benchmark throttle calls inside and outside the window
fn bench_throttle(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle");

    let clock = MockClock::new(Instant::now());
    let timer = MockTimer::new(clock.clone());
    let throttled = Throttle::builder(|n: u64| n + 1)
        .with_window(Duration::from_millis(100))
        .with_clock(Arc::new(clock.clone()))
        .with_timer(Arc::new(timer.clone()))
        .build()
        .unwrap();

    group.bench_function("execute", |b| {
        b.iter(|| {
            clock.advance(Duration::from_millis(100));
            throttled.call(black_box(1))
        })
    });

    group.bench_function("defer", |b| {
        throttled.call(0);
        b.iter(|| throttled.call(black_box(1)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_once,
    bench_memoize,
    bench_memoize_concurrent,
    bench_throttle
);
criterion_main!(benches);
