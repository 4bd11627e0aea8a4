//! Circuit breaker state machine implementation.

use tokio::time::Instant;

use crate::config::Settings;

/// Represents the observable states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Fewer consecutive failures than the threshold, calls are attempted.
    Closed = 0,

    /// The threshold has been reached and calls are rejected.
    Open = 1,

    /// The threshold has been reached but the cool-down has elapsed, so the
    /// next call is let through as a recovery trial.
    HalfOpen = 2,
}

impl State {
    /// Lowercase name used for metrics labels and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

/// Mutable bookkeeping of one circuit, guarded by the circuit's lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct CircuitState {
    /// Consecutive failing attempts since the last success or reset.
    pub(crate) failure_count: u32,
    /// Start of the most recently admitted attempt.
    pub(crate) last_attempt: Option<Instant>,
    /// Set while the admitted attempt is a recovery trial.
    pub(crate) on_trial: bool,
}

impl CircuitState {
    /// The threshold has been reached.
    pub(crate) fn is_tripped(&self, settings: &Settings) -> bool {
        self.failure_count >= settings.failure_threshold
    }

    /// A recovery trial may be admitted at `now`: at least `retry_at` has
    /// passed since the last attempt started. A cool-down too long to
    /// represent as an instant never elapses.
    pub(crate) fn recovery_due(&self, settings: &Settings, now: Instant) -> bool {
        if !settings.trying_recovery {
            return false;
        }

        match self.last_attempt {
            Some(last) => last
                .checked_add(settings.retry_at)
                .map_or(false, |due| now >= due),
            None => true,
        }
    }

    /// Derives the observable state at `now`.
    pub(crate) fn phase(&self, settings: &Settings, now: Instant) -> State {
        if self.on_trial {
            State::HalfOpen
        } else if !self.is_tripped(settings) {
            State::Closed
        } else if self.recovery_due(settings, now) {
            State::HalfOpen
        } else {
            State::Open
        }
    }

    /// Moves an open circuit into a recovery trial.
    pub(crate) fn begin_trial(&mut self) {
        self.failure_count = 0;
        self.on_trial = true;
    }

    /// Stamps the start of an admitted attempt.
    pub(crate) fn mark_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    /// Records a successful attempt and returns the state it left.
    pub(crate) fn record_success(&mut self, settings: &Settings) -> State {
        let from = self.settled(settings);
        self.failure_count = 0;
        self.on_trial = false;
        from
    }

    /// Records a failed attempt and returns the state it left.
    ///
    /// A failed trial reopens the circuit straight away, so the next trial has
    /// to wait for another full cool-down.
    pub(crate) fn record_failure(&mut self, settings: &Settings) -> State {
        let from = self.settled(settings);
        if self.on_trial {
            self.failure_count = self
                .failure_count
                .saturating_add(1)
                .max(settings.failure_threshold);
            self.on_trial = false;
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
        }
        from
    }

    /// Zeroes the counter, leaving the last attempt time alone.
    pub(crate) fn reset(&mut self) {
        self.failure_count = 0;
        self.on_trial = false;
    }

    // State as seen from inside an attempt, where the clock is irrelevant.
    fn settled(&self, settings: &Settings) -> State {
        if self.on_trial {
            State::HalfOpen
        } else if self.is_tripped(settings) {
            State::Open
        } else {
            State::Closed
        }
    }
}
