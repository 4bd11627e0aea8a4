//! # circuit-guard
//!
//! A consecutive-failure circuit breaker for async Rust.
//!
//! A [`Circuit`] wraps a fallible operation that takes a [`Context`]. Each
//! failed, timed-out or cancelled attempt bumps a counter; once the counter
//! reaches the failure threshold, further calls fail fast with
//! [`BreakerError::Open`] instead of reaching the broken dependency. After a
//! cool-down a single trial call is let through: if it succeeds the circuit
//! closes again, if it fails the circuit reopens for another cool-down.
//!
//! ## States
//!
//! - **Closed**: Fewer consecutive failures than the threshold. Calls run.
//! - **Open**: The threshold was reached. Calls are rejected without running.
//! - **Half-Open**: The cool-down has elapsed; the next call runs as a trial.
//!
//! Attempts on one circuit never overlap: each admitted call holds the circuit
//! from its pacing delay until its outcome has been recorded.
//!
//! ## Basic Usage
//!
//! ```rust
//! use circuit_guard::{BreakerError, Circuit, Context};
//! use std::fmt;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "Service error: {}", self.0)
//!     }
//! }
//!
//! impl std::error::Error for ServiceError {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let circuit = Circuit::<String, ServiceError>::builder()
//!     .failure_threshold(3)
//!     .timeout(Duration::from_millis(500))
//!     .retry_at(Duration::from_secs(30))
//!     .build();
//!
//! let fetch = circuit.wrap(|_ctx: Context| async {
//!     Ok::<_, ServiceError>("Success".to_string())
//! });
//!
//! match fetch.call(Context::background()).await {
//!     Ok(body) => println!("Call succeeded: {}", body),
//!     Err(BreakerError::Open) => println!("Circuit is open, call was prevented"),
//!     Err(BreakerError::Operation(err)) => println!("Call failed: {}", err),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! # }
//! ```
//!
//! ## Features
//!
//! - `prometheus` - Prometheus metrics through `prometheus-client`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
pub mod context;
mod error;
mod hook;
mod metrics;
pub mod prelude;
mod state;

// Re-exports
pub use breaker::{Circuit, Guarded};
pub use config::{
    BreakerBuilder, Settings, DEFAULT_FAILURE_THRESHOLD, DEFAULT_INTERVAL, DEFAULT_RETRY_AT,
    DEFAULT_TIMEOUT,
};
pub use context::{CancelHandle, Context, ContextError};
pub use error::{BreakerError, BreakerResult};
pub use hook::HookRegistry;
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusMetricSink;
pub use metrics::{CallOutcome, MetricSink, NullMetricSink};
pub use state::State;
