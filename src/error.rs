//! Error taxonomy for the interaction and movement systems.
//!
//! None of these ever escape a frame: each one is handled where it occurs,
//! usually by logging it and dropping the user action that caused it.

use std::time::Duration;

use bevy::prelude::*;
use thiserror::Error;

/// Result type for interaction operations.
pub type InteractionResult<T> = Result<T, InteractionError>;

/// Errors raised by the interaction controller, the body lifecycle manager,
/// the ground constraint and the jump controller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InteractionError {
    /// The pickup target has no simulation body.
    #[error("entity {0} has no simulation body")]
    MissingBody(Entity),

    /// The pickup ray found no pickupable target.
    #[error("no pickupable object within {reach} units")]
    NoIntersection {
        /// Maximum reach of the pickup ray.
        reach: f32,
    },

    /// The walkable-surface selector matched no geometry.
    #[error("walkable selector {selector:?} matched no surfaces, ground constraint is inert")]
    UnmatchedSelector {
        /// Tags of the selector that matched nothing.
        selector: Vec<String>,
    },

    /// A jump did not complete within the safety bound.
    #[error("jump exceeded safety bound ({elapsed:?} > {limit:?}), forcing recovery")]
    SafetyTimeout {
        /// Time since the jump started.
        elapsed: Duration,
        /// Configured safety bound.
        limit: Duration,
    },

    /// A deferred velocity reached a body that was absent or not dynamic.
    #[error("velocity for entity {0} dropped, body not ready")]
    DeferredVelocityRace(Entity),
}
