//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust,no_run
//! use circuit_guard::prelude::*;
//! ```

pub use crate::breaker::{Circuit, Guarded};
pub use crate::config::Settings;
pub use crate::context::{CancelHandle, Context, ContextError};
pub use crate::error::{BreakerError, BreakerResult};
pub use crate::state::State;
