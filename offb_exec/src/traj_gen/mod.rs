//! # Trajectory generation module
//!
//! Trajectory generation pre-computes one full cycle of setpoints which the
//! streamer then replays to the autopilot. The lateral motion is a circle of
//! radius `r` swept once per cycle, with a vertical oscillation of four
//! periods per revolution superimposed on it:
//!
//! ```text
//! x = r cos(a)
//! y = r sin(a)
//! z = A sin(4a) - Z
//! ```
//!
//! where the sweep angle `a` runs from `-pi/2` (the rightmost point of the
//! curve when viewed along the forward axis) through one full revolution.
//! Velocity and acceleration are the analytic time derivatives of the
//! position. The yaw follows the horizontal velocity heading and the yaw rate
//! is differentiated numerically between neighbouring points of the closed
//! table.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod table;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::{Params, MAX_STEPS};
pub use table::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while generating a trajectory.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrajGenError {
    #[error("Parameter {0} must be finite")]
    NonFiniteParam(&'static str),

    #[error("Parameter {0} must be positive, found {1}")]
    NonPositiveParam(&'static str, f64),

    #[error(
        "A cycle of {cycle_s} s at {rate_hz} Hz does not contain a single step"
    )]
    NoSteps {
        cycle_s: f64,
        rate_hz: f64
    },

    #[error(
        "A cycle of {cycle_s} s at {rate_hz} Hz contains more than {max} steps"
    )]
    TooManySteps {
        cycle_s: f64,
        rate_hz: f64,
        max: usize
    },
}
