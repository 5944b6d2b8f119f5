//! # Setpoint streamer module
//!
//! The streamer replays the trajectory table to the autopilot, one setpoint
//! per cycle, while the vehicle reports that offboard control is enabled.
//!
//! Every other cycle an offboard control mode declaration is produced,
//! whatever the vehicle's mode. The autopilot only allows (and keeps) offboard
//! mode while these declarations keep arriving, so they must flow before the
//! mode is enabled and while setpoints are suppressed.
//!
//! Whenever the vehicle reports that offboard control is not enabled the
//! streamer drops back to the start of the trajectory, so that streaming
//! always resumes from the beginning of the curve.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of cycles between two offboard control mode declarations.
pub const CONTROL_MODE_DIVISOR: u64 = 2;
