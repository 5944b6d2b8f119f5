//! Implementations for the Streamer state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::fmu::{OffboardControlMode, TrajectorySetpoint};
use log::{debug, info, warn};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::CONTROL_MODE_DIVISOR;
use crate::traj_gen::TrajectoryTable;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Setpoint streamer module state
pub struct Streamer {
    table: TrajectoryTable,

    state: StreamerState,

    mode: StreamerMode,

    /// The setpoint output in the last cycle, if any.
    last_setpoint: Option<TrajectorySetpoint>,
    arch_setpoints: Archiver,
}

/// Mutable state of the streamer.
#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize)]
pub struct StreamerState {
    /// Index of the current point in the trajectory table.
    pub cursor: usize,

    /// Number of cycles processed, used to pace the control mode
    /// declarations.
    pub tick_count: u64,

    /// Offboard enabled flag observed in the last cycle.
    pub mode_enabled: bool,
}

/// Data required to initialise the streamer.
pub struct InitData {
    /// The trajectory to stream.
    pub table: TrajectoryTable,

    /// If true every published setpoint is archived.
    pub archive_setpoints: bool,
}

/// Input data to the streamer.
#[derive(Clone, Copy, Default, Debug)]
pub struct InputData {
    /// Latest value of the vehicle's offboard control enabled flag.
    pub offboard_enabled: bool,

    /// Current monotonic time.
    ///
    /// Units: microseconds
    pub timestamp_us: u64,
}

/// Messages the streamer wants published this cycle.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct OutputData {
    /// Offboard control mode declaration, produced every other cycle.
    pub control_mode: Option<OffboardControlMode>,

    /// Trajectory setpoint, produced only while offboard control is enabled.
    pub setpoint: Option<TrajectorySetpoint>,
}

/// Status report for streamer processing.
#[derive(Clone, Copy, Default, Debug, Serialize)]
pub struct StatusReport {
    pub mode: StreamerMode,

    /// Cursor at the end of the cycle.
    pub cursor: usize,

    pub tick_count: u64,

    /// True if the mode changed in this cycle.
    pub transitioned: bool,
}

/// Flat record of a published setpoint for archiving.
#[derive(Serialize)]
struct SetpointRecord {
    timestamp_us: u64,
    cursor: usize,
    x_m: f32,
    y_m: f32,
    z_m: f32,
    vx_ms: f32,
    vy_ms: f32,
    vz_ms: f32,
    ax_mss: f32,
    ay_mss: f32,
    az_mss: f32,
    yaw_rad: f32,
    yawspeed_rads: f32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The possible modes of the streamer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StreamerMode {
    /// Offboard control is not enabled, no setpoints are output.
    Suppressed,

    /// Offboard control is enabled, setpoints are output every cycle.
    Streaming,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StreamerMode {
    fn default() -> Self {
        StreamerMode::Suppressed
    }
}

impl State for Streamer {
    type InitData = InitData;
    type InitError = ArchiveError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the Streamer module.
    fn init(init_data: Self::InitData, session: &Session)
        -> Result<Self, Self::InitError>
    {
        let mut streamer = Self::new(init_data.table);

        if init_data.archive_setpoints {
            streamer.arch_setpoints = Archiver::from_path(
                session, "streamer/setpoints.csv"
            )?;
        }

        Ok(streamer)
    }

    /// Perform one streaming cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let now = input_data.timestamp_us;

        self.state.tick_count += 1;

        // The declaration keeps offboard eligibility alive, it is sent
        // whatever the vehicle mode
        let control_mode = match self.state.tick_count % CONTROL_MODE_DIVISOR {
            0 => Some(OffboardControlMode::position_only(now)),
            _ => None
        };

        // Advance along the trajectory, stamping a copy of the point rather
        // than the table itself
        self.state.cursor = (self.state.cursor + 1) % self.table.steps();

        let mut setpoint = self.table[self.state.cursor];
        setpoint.timestamp = now;

        // Apply the vehicle mode
        self.state.mode_enabled = input_data.offboard_enabled;

        // TODO: debounce of the enabled flag, a single stale reading currently
        // toggles the mode
        let mode = match self.state.mode_enabled {
            true => StreamerMode::Streaming,
            false => StreamerMode::Suppressed
        };

        let transitioned = mode != self.mode;
        if transitioned {
            match mode {
                StreamerMode::Streaming => info!(
                    "Offboard control enabled, streaming from point {}",
                    self.state.cursor
                ),
                StreamerMode::Suppressed => warn!(
                    "Offboard control not enabled, setpoints suppressed"
                )
            }
        }
        self.mode = mode;

        let setpoint = match self.mode {
            StreamerMode::Streaming => {
                debug!(
                    "x:{:7.3} y:{:7.3} z:{:7.3} yaw:{:7.1}",
                    setpoint.position[0],
                    setpoint.position[1],
                    setpoint.position[2],
                    setpoint.yaw.to_degrees()
                );
                Some(setpoint)
            },
            StreamerMode::Suppressed => {
                self.state.cursor = 0;
                None
            }
        };

        self.last_setpoint = setpoint;

        Ok((
            OutputData {
                control_mode,
                setpoint
            },
            StatusReport {
                mode: self.mode,
                cursor: self.state.cursor,
                tick_count: self.state.tick_count,
                transitioned
            }
        ))
    }
}

impl Archived for Streamer {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let sp = match self.last_setpoint {
            Some(sp) => sp,
            None => return Ok(())
        };

        self.arch_setpoints.serialise(SetpointRecord {
            timestamp_us: sp.timestamp,
            cursor: self.state.cursor,
            x_m: sp.position[0],
            y_m: sp.position[1],
            z_m: sp.position[2],
            vx_ms: sp.velocity[0],
            vy_ms: sp.velocity[1],
            vz_ms: sp.velocity[2],
            ax_mss: sp.acceleration[0],
            ay_mss: sp.acceleration[1],
            az_mss: sp.acceleration[2],
            yaw_rad: sp.yaw,
            yawspeed_rads: sp.yawspeed,
        })
    }
}

impl Streamer {
    /// Create a new streamer for the given trajectory, without archiving.
    ///
    /// The streamer starts suppressed at the start of the trajectory.
    pub fn new(table: TrajectoryTable) -> Self {
        Self {
            table,
            state: StreamerState::default(),
            mode: StreamerMode::default(),
            last_setpoint: None,
            arch_setpoints: Archiver::default(),
        }
    }

    /// Current state of the streamer.
    pub fn state(&self) -> &StreamerState {
        &self.state
    }

    /// Current mode of the streamer.
    pub fn mode(&self) -> StreamerMode {
        self.mode
    }

    /// The trajectory being streamed.
    pub fn table(&self) -> &TrajectoryTable {
        &self.table
    }
}
