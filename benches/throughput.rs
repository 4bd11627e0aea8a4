use circuit_guard::{Circuit, Context};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

// Custom error type that implements Error trait
#[derive(Debug)]
struct BenchError(String);

impl BenchError {
    fn new(msg: &str) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Benchmark error: {}", self.0)
    }
}

impl Error for BenchError {}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_circuit_closed(c: &mut Criterion) {
    let rt = runtime();
    let circuit = Circuit::<(), BenchError>::builder()
        .failure_threshold(5)
        .retry_at(Duration::from_secs(30))
        .build();
    let guarded = circuit.wrap(|_ctx| async { Ok(()) });

    c.bench_function("circuit_closed_success", |b| {
        b.iter(|| rt.block_on(async { black_box(guarded.call(Context::background()).await) }));
    });
}

fn bench_circuit_open_rejection(c: &mut Criterion) {
    let rt = runtime();
    let circuit = Circuit::<(), BenchError>::builder()
        .failure_threshold(5)
        .retry_at(Duration::from_secs(3600))
        .build();
    let failing = circuit.wrap(|_ctx| async { Err(BenchError::new("Simulated failure")) });

    c.bench_function("circuit_open_rejection", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                circuit.reset().await;
                for _ in 0..5 {
                    let _ = failing.call(Context::background()).await;
                }

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    let _ = black_box(failing.call(Context::background()).await);
                }
                start.elapsed()
            })
        });
    });
}

fn bench_circuit_concurrent(c: &mut Criterion) {
    const TASK_COUNT: usize = 4;
    const ITERATIONS_PER_TASK: usize = 250;

    let rt = runtime();
    let circuit = Circuit::<(), BenchError>::builder()
        .failure_threshold(100) // High to avoid tripping
        .build();
    let guarded = Arc::new(circuit.wrap(|_ctx| async { Ok(()) }));

    c.bench_function("circuit_concurrent", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut handles = Vec::with_capacity(TASK_COUNT);
                for _ in 0..TASK_COUNT {
                    let guarded = Arc::clone(&guarded);
                    handles.push(tokio::spawn(async move {
                        for _ in 0..ITERATIONS_PER_TASK {
                            let _ = black_box(guarded.call(Context::background()).await);
                        }
                    }));
                }

                for handle in handles {
                    handle.await.unwrap();
                }
            })
        });
    });
}

criterion_group!(
    benches,
    bench_circuit_closed,
    bench_circuit_open_rejection,
    bench_circuit_concurrent
);
criterion_main!(benches);
