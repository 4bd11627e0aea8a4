//! Metric sinks receiving circuit breaker events.

use std::time::Duration;

/// How an admitted attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallOutcome {
    /// The operation returned a value.
    Success,
    /// The operation returned an error.
    Failure,
    /// The attempt ran past the configured timeout.
    Timeout,
    /// The caller's context ended the attempt.
    Cancelled,
}

impl CallOutcome {
    /// Lowercase name used for metrics labels and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Timeout => "timeout",
            CallOutcome::Cancelled => "cancelled",
        }
    }

    /// Every outcome except `Success` counts towards the threshold.
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }
}

/// Trait for metrics sinks that can receive circuit breaker events.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, from: &str, to: &str);

    /// Records a call rejected by an open circuit.
    fn record_rejection(&self);

    /// Records the outcome of an admitted attempt.
    fn record_call(&self, outcome: CallOutcome, duration: Duration);
}

/// A null metrics sink that discards all events.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: &str, _to: &str) {}
    fn record_rejection(&self) {}
    fn record_call(&self, _outcome: CallOutcome, _duration: Duration) {}
}

#[cfg(feature = "prometheus")]
pub use self::prometheus::PrometheusMetricSink;

#[cfg(feature = "prometheus")]
mod prometheus {
    use super::{CallOutcome, MetricSink};
    use prometheus_client::encoding::EncodeLabelSet;
    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
    use prometheus_client::registry::Registry;
    use std::time::Duration;

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct OutcomeLabels {
        outcome: String,
    }

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct TransitionLabels {
        from: String,
        to: String,
    }

    /// A metric sink exporting through `prometheus-client`.
    #[derive(Clone)]
    pub struct PrometheusMetricSink {
        calls: Family<OutcomeLabels, Counter>,
        transitions: Family<TransitionLabels, Counter>,
        rejections: Counter,
        duration: Histogram,
    }

    impl PrometheusMetricSink {
        /// Creates the sink and registers its metrics under `registry`.
        pub fn new(registry: &mut Registry) -> Self {
            let sink = Self {
                calls: Family::default(),
                transitions: Family::default(),
                rejections: Counter::default(),
                duration: Histogram::new(exponential_buckets(0.0005, 2.0, 16)),
            };

            registry.register(
                "circuit_calls",
                "Admitted attempts by outcome",
                sink.calls.clone(),
            );
            registry.register(
                "circuit_transitions",
                "Circuit state transitions",
                sink.transitions.clone(),
            );
            registry.register(
                "circuit_rejections",
                "Calls rejected by an open circuit",
                sink.rejections.clone(),
            );
            registry.register(
                "circuit_call_duration_seconds",
                "Duration of admitted attempts",
                sink.duration.clone(),
            );

            sink
        }
    }

    impl MetricSink for PrometheusMetricSink {
        fn record_state_transition(&self, from: &str, to: &str) {
            self.transitions
                .get_or_create(&TransitionLabels {
                    from: from.to_owned(),
                    to: to.to_owned(),
                })
                .inc();
        }

        fn record_rejection(&self) {
            self.rejections.inc();
        }

        fn record_call(&self, outcome: CallOutcome, duration: Duration) {
            self.calls
                .get_or_create(&OutcomeLabels {
                    outcome: outcome.as_str().to_owned(),
                })
                .inc();
            self.duration.observe(duration.as_secs_f64());
        }
    }
}
