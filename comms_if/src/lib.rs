//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the FMU message definitions
//! exchanged with the autopilot bridge and the networking abstractions used to move them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions for the flight management unit (autopilot) bridge
pub mod fmu;

/// Network module
pub mod net;
