//! Library error type.
//!
//! The engine's failure kinds are deliberately narrow. A missing clearance
//! at dereference time is a script-ordering bug and is fatal for that
//! flight; everything else at the maneuver layer is either a recovery
//! (logged, not raised) or out of scope.

use crate::flight::ClearanceKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// A deferred maneuver dereferenced a clearance that was never awaited.
    #[error("flight {call_sign}: no {kind:?} clearance on file")]
    MissingClearance {
        call_sign: String,
        kind: ClearanceKind,
    },

    #[error("runway end {0} not found")]
    UnknownRunway(String),

    #[error("parking stand {0} not found")]
    UnknownStand(String),
}
