//! Configuration for circuit breakers.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::Circuit;
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};

/// Consecutive failures before the circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Upper bound on a single attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Pacing delay before every attempt.
pub const DEFAULT_INTERVAL: Duration = Duration::ZERO;
/// Cool-down after the last attempt before a recovery trial.
pub const DEFAULT_RETRY_AT: Duration = Duration::from_secs(30);

/// Tunables of a circuit.
///
/// `Default` yields the documented defaults. Zero values of
/// `failure_threshold`, `timeout` and `retry_at` are replaced by their
/// defaults when the settings are applied, see [`Settings::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time allowed for one attempt before it counts as a timeout.
    pub timeout: Duration,
    /// Delay inserted before every attempt.
    pub interval: Duration,
    /// Time since the last attempt after which an open circuit lets a trial through.
    pub retry_at: Duration,
    /// Whether an open circuit ever lets a trial through.
    pub trying_recovery: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            retry_at: DEFAULT_RETRY_AT,
            trying_recovery: true,
        }
    }
}

impl Settings {
    /// Replaces zero-valued fields by their defaults.
    ///
    /// Nothing is validated; any non-zero value is kept as given.
    pub fn normalized(self) -> Self {
        Self {
            failure_threshold: if self.failure_threshold == 0 {
                DEFAULT_FAILURE_THRESHOLD
            } else {
                self.failure_threshold
            },
            timeout: if self.timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                self.timeout
            },
            interval: self.interval,
            retry_at: if self.retry_at.is_zero() {
                DEFAULT_RETRY_AT
            } else {
                self.retry_at
            },
            trying_recovery: self.trying_recovery,
        }
    }
}

/// Builder for creating circuits with custom configurations.
pub struct BreakerBuilder<T, E> {
    settings: Settings,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Default for BreakerBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> BreakerBuilder<T, E> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            _marker: PhantomData,
        }
    }

    /// Sets the number of consecutive failures that opens the circuit.
    pub fn failure_threshold(mut self, count: u32) -> Self {
        self.settings.failure_threshold = count;
        self
    }

    /// Sets the time allowed for a single attempt.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.settings.timeout = duration;
        self
    }

    /// Sets the pacing delay inserted before every attempt.
    pub fn interval(mut self, duration: Duration) -> Self {
        self.settings.interval = duration;
        self
    }

    /// Sets the cool-down before an open circuit lets a trial through.
    pub fn retry_at(mut self, duration: Duration) -> Self {
        self.settings.retry_at = duration;
        self
    }

    /// Enables or disables automatic recovery trials.
    pub fn trying_recovery(mut self, enabled: bool) -> Self {
        self.settings.trying_recovery = enabled;
        self
    }

    /// Replaces all tunables at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets a metric sink for the circuit.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Builds a new circuit with the configured settings.
    pub fn build(self) -> Circuit<T, E> {
        Circuit::with_parts(
            self.settings.normalized(),
            self.metric_sink,
            self.hook_registry,
        )
    }
}
