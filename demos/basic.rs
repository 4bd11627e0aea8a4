use circuit_guard::{BreakerError, Circuit, Context, Settings};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// A simulated upstream: healthy for a few calls, then hanging, then healthy again
async fn fetch_status(ctx: Context, calls: Arc<AtomicU32>) -> Result<u16, ServiceError> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    if (3..8).contains(&n) {
        tokio::select! {
            _ = ctx.done() => return Err(ServiceError("request abandoned".to_string())),
            _ = tokio::time::sleep(Duration::from_secs(2)) => {}
        }
    }
    if n % 4 == 1 {
        return Err(ServiceError("502 Bad Gateway".to_string()));
    }
    Ok(200)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let circuit = Circuit::<u16, ServiceError>::new();
    circuit.configure(Settings {
        failure_threshold: 3,
        timeout: Duration::from_millis(500),
        retry_at: Duration::from_secs(2),
        ..Settings::default()
    });

    let calls = Arc::new(AtomicU32::new(0));
    let status = circuit.wrap(move |ctx| fetch_status(ctx, Arc::clone(&calls)));

    println!("Circuit initial state: {:?}", circuit.current_state().await);

    for i in 1..=10 {
        match status.call(Context::background()).await {
            Ok(code) => println!("{} : {}", i, code),
            Err(BreakerError::Open) => {
                println!("{} : circuit is open, waiting before retry...", i);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(err) => println!("{} : {}", i, err),
        }
        println!("Current state: {:?}", circuit.current_state().await);
    }

    // Concurrent callers queue on the circuit, one attempt at a time
    let handles: Vec<_> = (0..10)
        .map(|j| {
            let status = status.clone();
            tokio::spawn(async move {
                let (ctx, _cancel) = Context::background().with_timeout(Duration::from_secs(3));
                match status.call(ctx).await {
                    Ok(code) => println!("{} : {}", j, code),
                    Err(err) => println!("{} : {}", j, err),
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.await;
    }
}
