//! Core infrastructure shared by the loader.
//!
//! - [`types`]: row, label, score and bin index types
//! - [`constants`]: defaults and numeric thresholds
//! - [`error`]: the crate error type
//! - [`random`]: the seeded generator used for sampling and partitioning
//! - [`network`]: the collective all-gather used by distributed loading

pub mod constants;
pub mod error;
pub mod network;
pub mod random;
pub mod types;

pub use constants::*;
pub use error::{LightGBMError, Result};
pub use network::{AllgatherFunction, LocalCluster, Network};
pub use random::Random;
pub use types::*;

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Install the `env_logger` backend once per process.
///
/// Respects `RUST_LOG`; defaults to `info`. Calling it again, or after the
/// application installed its own logger, is a no-op.
pub fn initialize_logging() {
    LOGGER_INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    });
}

/// Whether [`initialize_logging`] has run.
pub fn is_logging_initialized() -> bool {
    LOGGER_INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_logging_is_idempotent() {
        initialize_logging();
        initialize_logging();
        assert!(is_logging_initialized());
    }
}
