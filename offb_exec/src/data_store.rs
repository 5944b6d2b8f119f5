//! # Data Store

use log::{info, warn};

use crate::streamer;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Session elapsed time at the start of the cycle
    pub session_time_s: f64,

    // Streamer
    pub streamer_input: streamer::InputData,
    pub streamer_output: streamer::OutputData,
    pub streamer_status_rpt: streamer::StatusReport,

    // Network
    /// Number of subscribers to the setpoint publisher, i.e. autopilot bridges
    pub fmu_in_peers: usize,

    /// Set once setpoints have been streamed with no subscriber, cleared when one connects
    pub warned_setpoints_unheard: bool,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Total number of messages which could not be published to the autopilot
    pub num_publish_errors: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears the previous cycle's streamer outputs and latches the inputs for this one.
    pub fn cycle_start(&mut self, offboard_enabled: bool, timestamp_us: u64) {
        self.streamer_input = streamer::InputData {
            offboard_enabled,
            timestamp_us
        };
        self.streamer_output = streamer::OutputData::default();
        self.streamer_status_rpt = streamer::StatusReport::default();

        self.session_time_s = util::session::get_elapsed_seconds();
    }

    /// Record the number of subscribers to the setpoint publisher, logging any change.
    ///
    /// Returns `true` if the number changed.
    pub fn set_fmu_in_peers(&mut self, peers: usize) -> bool {
        if peers == self.fmu_in_peers {
            return false
        }

        match (self.fmu_in_peers, peers) {
            (0, n) => info!("Autopilot bridge connected ({} subscriber(s))", n),
            (_, 0) => warn!("Autopilot bridge disconnected"),
            (_, n) => info!("Autopilot bridge subscribers: {}", n)
        }

        if peers > 0 {
            self.warned_setpoints_unheard = false;
        }
        self.fmu_in_peers = peers;

        true
    }

    /// Warn, once per disconnection, if a setpoint is being output with nothing subscribed to it.
    ///
    /// Returns `true` if the warning was issued this cycle.
    pub fn check_setpoints_heard(&mut self) -> bool {
        if self.streamer_output.setpoint.is_none()
            || self.fmu_in_peers > 0
            || self.warned_setpoints_unheard
        {
            return false
        }

        warn!("Streaming setpoints but no autopilot bridge is subscribed");
        self.warned_setpoints_unheard = true;

        true
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }
}
