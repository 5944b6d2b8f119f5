//! # Offboard Executable Parameters
//!
//! This module provide parameters for the offboard executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OffbExecParams {

    /// If true every published setpoint is written to the session archive
    #[serde(default)]
    pub archive_setpoints: bool,

    /// Number of consecutive cycle overruns after which an error is reported
    #[serde(default = "default_max_consec_overruns_warn")]
    pub max_consec_overruns_warn: u64
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_max_consec_overruns_warn() -> u64 {
    20
}
