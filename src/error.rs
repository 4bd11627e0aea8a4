//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use crate::context::ContextError;

/// Result type for guarded calls.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error returned by a guarded call.
///
/// Every variant except [`BreakerError::Open`] is counted as a failure by the
/// circuit that produced it.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The failure threshold has been reached, the call was not attempted.
    Open,

    /// The call did not complete within the configured timeout.
    Timeout,

    /// The caller's context was cancelled or its deadline passed.
    Cancelled(ContextError),

    /// The underlying operation failed.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected by an open circuit.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns true if the call ran past the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout)
    }

    /// Returns true if the caller's context ended the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BreakerError::Cancelled(_))
    }

    /// Returns the operation's own error, if that is what failed the call.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<ContextError> for BreakerError<E> {
    fn from(err: ContextError) -> Self {
        BreakerError::Cancelled(err)
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit breaker: reached failure threshold"),
            BreakerError::Timeout => write!(f, "circuit breaker: reached timeout"),
            BreakerError::Cancelled(e) => write!(f, "circuit breaker: {}", e),
            BreakerError::Operation(e) => write!(f, "circuit breaker: operation failed: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Cancelled(e) => Some(e),
            BreakerError::Open | BreakerError::Timeout => None,
        }
    }
}
