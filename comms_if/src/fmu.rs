//! # FMU Interface
//!
//! This module defines the messages exchanged with the flight management unit (FMU) through the
//! autopilot bridge. The layouts follow the autopilot's own message definitions so that the bridge
//! only has to forward fields, never reinterpret them.
//!
//! Topics under `/fmu/in/` are consumed by the autopilot, topics under `/fmu/out/` are produced by
//! it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Topic on which the offboard control mode declaration is sent to the autopilot.
pub const OFFBOARD_CONTROL_MODE_TOPIC: &str = "/fmu/in/offboard_control_mode";

/// Topic on which trajectory setpoints are sent to the autopilot.
pub const TRAJECTORY_SETPOINT_TOPIC: &str = "/fmu/in/trajectory_setpoint";

/// Topic on which the autopilot reports its control mode flags.
pub const VEHICLE_CONTROL_MODE_TOPIC: &str = "/fmu/out/vehicle_control_mode";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A message which is carried on a single, fixed FMU topic.
pub trait FmuMessage: Serialize + DeserializeOwned {
    /// The topic this message is published on.
    const TOPIC: &'static str;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Declares which control loops the offboard computer intends to drive.
///
/// The autopilot will only stay in (or enter) offboard mode while this message keeps arriving, so
/// it must be sent continuously, even when no setpoint is being streamed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct OffboardControlMode {
    /// Time since system start.
    ///
    /// Units: microseconds
    pub timestamp: u64,

    pub position: bool,
    pub velocity: bool,
    pub acceleration: bool,
    pub attitude: bool,
    pub body_rate: bool,
}

/// A trajectory setpoint in the local frame.
///
/// Frame: x right, y forward, z up.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TrajectorySetpoint {
    /// Time since system start.
    ///
    /// Units: microseconds
    pub timestamp: u64,

    /// Units: meters
    pub position: [f32; 3],

    /// Units: meters/second
    pub velocity: [f32; 3],

    /// Units: meters/second^2
    pub acceleration: [f32; 3],

    /// Euler angle of the desired attitude.
    ///
    /// Units: radians
    pub yaw: f32,

    /// Angular velocity around the vertical axis.
    ///
    /// Units: radians/second
    pub yawspeed: f32,
}

/// Control mode flags reported by the autopilot.
///
/// Only a subset of the autopilot's flags is mirrored here, any field missing from an incoming
/// message is defaulted to `false`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct VehicleControlMode {
    /// Time since system start.
    ///
    /// Units: microseconds
    pub timestamp: u64,

    pub flag_armed: bool,
    pub flag_control_manual_enabled: bool,
    pub flag_control_auto_enabled: bool,
    pub flag_control_offboard_enabled: bool,
    pub flag_control_position_enabled: bool,
    pub flag_control_velocity_enabled: bool,
    pub flag_control_altitude_enabled: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OffboardControlMode {
    /// Declaration that only the position loop is driven by the offboard computer.
    pub fn position_only(timestamp: u64) -> Self {
        Self {
            timestamp,
            position: true,
            velocity: false,
            acceleration: false,
            attitude: false,
            body_rate: false,
        }
    }
}

impl FmuMessage for OffboardControlMode {
    const TOPIC: &'static str = OFFBOARD_CONTROL_MODE_TOPIC;
}

impl FmuMessage for TrajectorySetpoint {
    const TOPIC: &'static str = TRAJECTORY_SETPOINT_TOPIC;
}

impl FmuMessage for VehicleControlMode {
    const TOPIC: &'static str = VEHICLE_CONTROL_MODE_TOPIC;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_position_only() {
        let ocm = OffboardControlMode::position_only(1234);

        assert_eq!(ocm.timestamp, 1234);
        assert!(ocm.position);
        assert!(!ocm.velocity);
        assert!(!ocm.acceleration);
        assert!(!ocm.attitude);
        assert!(!ocm.body_rate);
    }

    #[test]
    fn test_vehicle_control_mode_partial() {
        // The bridge may forward more or fewer flags than we mirror
        let vcm: VehicleControlMode = serde_json::from_str(
            r#"{"timestamp": 10, "flag_control_offboard_enabled": true, "flag_multicopter_position_control_enabled": true}"#
        ).unwrap();

        assert_eq!(vcm.timestamp, 10);
        assert!(vcm.flag_control_offboard_enabled);
        assert!(!vcm.flag_armed);
    }
}
