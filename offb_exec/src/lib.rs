//! # Offboard library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the offboard crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable
pub mod data_store;

/// FMU client - publishes messages to the autopilot and tracks its control mode
pub mod fmu_client;

/// Executable parameters
pub mod params;

/// Setpoint streamer - replays the trajectory table while offboard control is enabled
pub mod streamer;

/// Trajectory generation - builds the table of setpoints for one cycle of the curve
pub mod traj_gen;
