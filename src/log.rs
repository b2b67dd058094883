//! Logging for the router.
//!
//! Per-connection outcomes and capped search runs are logged through
//! `debug!` and `warn!`. With the `tracing` feature these are the `tracing`
//! macros; without it the calls compile away.

#[cfg(feature = "tracing")]
pub use tracing::{debug, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, warn};
