//! Lighting system errors

use thiserror::Error;

/// Lighting system errors
///
/// Only conditions the caller must react to are errors; unknown handles and
/// overflowing clusters degrade silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LightingError {
    /// The registry already owns its maximum number of lights
    #[error("Light capacity exceeded: registry holds at most {max} lights")]
    CapacityExceeded {
        /// Configured capacity
        max: usize,
    },

    /// The lighting system has been disposed
    #[error("Lighting system has been disposed")]
    Disposed,
}
