//! Core circuit breaker implementation.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{BreakerBuilder, Settings};
use crate::context::{CancelHandle, Context, ContextError};
use crate::error::{BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::metrics::{CallOutcome, MetricSink};
use crate::state::{CircuitState, State};

/// Inner state of the circuit, shared between clones.
struct CircuitInner {
    state: RwLock<CircuitState>,
    settings: parking_lot::RwLock<Settings>,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// A circuit breaker guarding operations that produce a `T` or fail with an `E`.
///
/// Every admitted attempt holds the circuit exclusively from its pacing delay
/// until its outcome is recorded, so at most one guarded operation runs at a
/// time per circuit. Calls rejected by an open circuit only take the shared
/// lock, so rejections do not queue behind each other.
pub struct Circuit<T, E> {
    inner: Arc<CircuitInner>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Circuit<T, E> {
    /// Creates a circuit with the default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new builder for customizing a circuit.
    pub fn builder() -> BreakerBuilder<T, E> {
        BreakerBuilder::new()
    }

    pub(crate) fn with_parts(
        settings: Settings,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = CircuitInner {
            state: RwLock::new(CircuitState::default()),
            settings: parking_lot::RwLock::new(settings),
            metric_sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
            _marker: PhantomData,
        }
    }

    /// Applies new tunables to the live circuit.
    ///
    /// Zero values are replaced by defaults. The failure counter and last
    /// attempt time are left alone; an attempt already in flight keeps the
    /// settings it started with.
    pub fn configure(&self, settings: Settings) {
        let settings = settings.normalized();
        *self.inner.settings.write() = settings;
        debug!(
            failure_threshold = settings.failure_threshold,
            timeout = ?settings.timeout,
            interval = ?settings.interval,
            retry_at = ?settings.retry_at,
            trying_recovery = settings.trying_recovery,
            "circuit reconfigured"
        );
    }

    /// Returns the tunables currently in effect.
    pub fn settings(&self) -> Settings {
        *self.inner.settings.read()
    }

    /// Returns the number of consecutive failures.
    ///
    /// A failed recovery trial sets the counter straight to the failure
    /// threshold rather than to one, reopening the circuit.
    ///
    /// Waits for an attempt in flight to finish.
    pub async fn failure_count(&self) -> u32 {
        self.inner.state.read().await.failure_count
    }

    /// Gets the current state of the circuit.
    ///
    /// Waits for an attempt in flight to finish.
    pub async fn current_state(&self) -> State {
        let settings = self.settings();
        self.inner
            .state
            .read()
            .await
            .phase(&settings, Instant::now())
    }

    /// Zeroes the failure counter, closing the circuit.
    ///
    /// Waits for an attempt in flight to finish.
    pub async fn reset(&self) {
        let settings = self.settings();
        let mut state = self.inner.state.write().await;
        let from = state.phase(&settings, Instant::now());
        state.reset();
        drop(state);

        info!(from = from.as_str(), "circuit reset");
        if from != State::Closed {
            self.transition(from, State::Closed);
        }
    }

    fn transition(&self, from: State, to: State) {
        self.inner.hooks.execute_state_transition_hook(to);
        self.inner
            .metric_sink
            .record_state_transition(from.as_str(), to.as_str());
    }

    fn reject(&self, failures: u32) -> BreakerError<E> {
        trace!(failures, "circuit open, call rejected");
        self.inner.hooks.execute_reject_hook();
        self.inner.metric_sink.record_rejection();
        BreakerError::Open
    }

    fn record_outcome(
        &self,
        state: &mut CircuitState,
        settings: &Settings,
        outcome: CallOutcome,
        duration: Duration,
    ) {
        self.inner.metric_sink.record_call(outcome, duration);

        if outcome.is_success() {
            let from = state.record_success(settings);
            debug!(elapsed = ?duration, "attempt succeeded");
            self.inner.hooks.execute_success_hook();

            if from != State::Closed {
                info!("recovery trial succeeded, circuit closed");
                self.transition(from, State::Closed);
            }
            return;
        }

        let from = state.record_failure(settings);
        debug!(
            outcome = outcome.as_str(),
            failures = state.failure_count,
            elapsed = ?duration,
            "attempt failed"
        );
        self.inner.hooks.execute_failure_hook();

        if from != State::Open && state.is_tripped(settings) {
            if from == State::HalfOpen {
                warn!(
                    retry_in = ?settings.retry_at,
                    "recovery trial failed, circuit reopened"
                );
            } else {
                warn!(
                    failures = state.failure_count,
                    threshold = settings.failure_threshold,
                    "failure threshold reached, circuit opened"
                );
            }
            self.transition(from, State::Open);
        }
    }
}

impl<T, E> Circuit<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Executes one operation through the circuit.
    ///
    /// The operation is spawned onto the runtime and raced against `ctx` and
    /// the configured timeout. If it loses that race, the context handed to it
    /// is cancelled and its task aborted; its result is never observed.
    /// Dropping the returned future mid-attempt does the same and counts the
    /// attempt as cancelled. A panic inside the operation is counted as a
    /// failure and then resumed on the caller.
    pub async fn call<F, Fut>(&self, ctx: Context, op: F) -> BreakerResult<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        {
            let settings = self.settings();
            let state = self.inner.state.read().await;
            if state.is_tripped(&settings) && !state.recovery_due(&settings, Instant::now()) {
                let failures = state.failure_count;
                drop(state);
                return Err(self.reject(failures));
            }
        }

        let mut state = self.inner.state.write().await;
        let settings = self.settings();

        // Another caller may have tripped the circuit, or used up the trial,
        // while this one waited for the lock.
        if state.is_tripped(&settings) {
            if !state.recovery_due(&settings, Instant::now()) {
                let failures = state.failure_count;
                drop(state);
                return Err(self.reject(failures));
            }

            state.begin_trial();
            info!(
                retry_at = ?settings.retry_at,
                "cool-down elapsed, admitting recovery trial"
            );
            self.transition(State::Open, State::HalfOpen);
        }

        let mut in_flight = InFlight {
            circuit: self,
            state,
            settings,
            started: Instant::now(),
            settled: false,
        };

        if !settings.interval.is_zero() {
            tokio::time::sleep(settings.interval).await;
        }

        in_flight.started = Instant::now();
        in_flight.state.mark_attempt(in_flight.started);
        debug!(
            failures = in_flight.state.failure_count,
            trial = in_flight.state.on_trial,
            "attempt admitted"
        );

        let result = match ctx.err() {
            Some(err) => Err(Attempt::Failed(BreakerError::Cancelled(err))),
            None => Self::run(&ctx, op, settings.timeout).await,
        };

        let outcome = match &result {
            Ok(_) => CallOutcome::Success,
            Err(Attempt::Failed(BreakerError::Timeout)) => CallOutcome::Timeout,
            Err(Attempt::Failed(BreakerError::Cancelled(_))) => CallOutcome::Cancelled,
            Err(_) => CallOutcome::Failure,
        };
        in_flight.settle(outcome);
        drop(in_flight);

        match result {
            Ok(value) => Ok(value),
            Err(Attempt::Failed(err)) => Err(err),
            Err(Attempt::Panicked(payload)) => std::panic::resume_unwind(payload),
        }
    }

    async fn run<F, Fut>(ctx: &Context, op: F, timeout: Duration) -> Result<T, Attempt<E>>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (attempt_ctx, abandon) = ctx.with_cancel();
        let mut spawned = Spawned {
            task: tokio::spawn(op(attempt_ctx)),
            abandon,
            finished: false,
        };

        let lost = tokio::select! {
            biased;
            joined = &mut spawned.task => {
                spawned.finished = true;
                match joined {
                    Ok(result) => {
                        return result.map_err(|e| Attempt::Failed(BreakerError::Operation(e)))
                    }
                    Err(err) if err.is_panic() => {
                        return Err(Attempt::Panicked(err.into_panic()))
                    }
                    // Aborted from outside, e.g. the runtime shutting down.
                    Err(_) => BreakerError::Cancelled(ContextError::Cancelled),
                }
            }
            err = ctx.done() => BreakerError::Cancelled(err),
            _ = tokio::time::sleep(timeout) => BreakerError::Timeout,
        };

        drop(spawned);
        Err(Attempt::Failed(lost))
    }

    /// Wraps an operation so that every invocation goes through this circuit.
    pub fn wrap<F, Fut>(&self, op: F) -> Guarded<T, E>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Guarded {
            circuit: self.clone(),
            op: Arc::new(move |ctx: Context| Box::pin(op(ctx)) as BoxFuture<'static, Result<T, E>>),
        }
    }
}

enum Attempt<E> {
    Failed(BreakerError<E>),
    Panicked(Box<dyn std::any::Any + Send + 'static>),
}

/// An admitted attempt holding the circuit's exclusive lock.
///
/// If dropped before `settle`, the caller gave up on the call future and the
/// attempt is recorded as cancelled.
struct InFlight<'a, T, E> {
    circuit: &'a Circuit<T, E>,
    state: RwLockWriteGuard<'a, CircuitState>,
    settings: Settings,
    started: Instant,
    settled: bool,
}

impl<T, E> InFlight<'_, T, E> {
    fn settle(&mut self, outcome: CallOutcome) {
        self.settled = true;
        self.circuit.record_outcome(
            &mut self.state,
            &self.settings,
            outcome,
            self.started.elapsed(),
        );
    }
}

impl<T, E> Drop for InFlight<'_, T, E> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("call dropped mid-attempt");
            self.settle(CallOutcome::Cancelled);
        }
    }
}

/// The spawned operation of an attempt. Unless it ran to completion, its
/// context is cancelled and its task aborted when this is dropped.
struct Spawned<T> {
    task: JoinHandle<T>,
    abandon: CancelHandle,
    finished: bool,
}

impl<T> Drop for Spawned<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.abandon.cancel();
            self.task.abort();
        }
    }
}

impl<T, E> Default for Circuit<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

// Allow cloning of circuits - cheap because inner state is Arc'd
impl<T, E> Clone for Circuit<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

type BoxedOp<T, E> = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// An operation bound to a circuit, see [`Circuit::wrap`].
pub struct Guarded<T, E> {
    circuit: Circuit<T, E>,
    op: BoxedOp<T, E>,
}

impl<T, E> Guarded<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Invokes the wrapped operation through the circuit.
    pub async fn call(&self, ctx: Context) -> BreakerResult<T, E> {
        let op = Arc::clone(&self.op);
        self.circuit.call(ctx, move |ctx| op(ctx)).await
    }

    /// The circuit guarding this operation.
    pub fn circuit(&self) -> &Circuit<T, E> {
        &self.circuit
    }

    /// Turns the guarded operation into a plain function of the same shape as
    /// the one that was wrapped.
    pub fn into_fn(
        self,
    ) -> impl Fn(Context) -> BoxFuture<'static, BreakerResult<T, E>> + Clone + Send + Sync {
        move |ctx: Context| -> BoxFuture<'static, BreakerResult<T, E>> {
            let guarded = self.clone();
            Box::pin(async move { guarded.call(ctx).await })
        }
    }
}

impl<T, E> Clone for Guarded<T, E> {
    fn clone(&self) -> Self {
        Self {
            circuit: self.circuit.clone(),
            op: Arc::clone(&self.op),
        }
    }
}
