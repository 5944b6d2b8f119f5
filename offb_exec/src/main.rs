//! Main offboard executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Build the trajectory table
//!     - Initialise the streamer and the FMU client
//!     - Main loop, once per trajectory step:
//!         - Read the vehicle's offboard control flag
//!         - Streamer processing
//!         - Publish the control mode declaration and setpoint
//!         - Write archives
//!     - Shutdown the FMU client once the loop has stopped
//!
//! # Modules
//!
//! All cyclic modules (e.g. `streamer`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::net::NetParams;
use offb_lib::{
    data_store::DataStore,
    fmu_client::FmuClient,
    params::OffbExecParams,
    streamer::{self, Streamer},
    traj_gen::{self, TrajectoryTable},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, warn};
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::WrapErr};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    host,
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session,
    time::monotonic_micros,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "offb_exec", about = "Stream an offboard trajectory to the autopilot")]
struct Opts {
    /// Stop streaming after this many seconds, otherwise run until killed
    #[structopt(short, long)]
    duration: Option<f64>,

    /// Minimum level of log messages, at least `info`
    #[structopt(long, default_value = "trace")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "offb_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Offboard Trajectory Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams = util::params::load(
        "net.toml"
    ).wrap_err("Could not load net params")?;

    let exec_params: OffbExecParams = util::params::load(
        "offb_exec.toml"
    ).wrap_err("Could not load exec params")?;

    let traj_params: traj_gen::Params = util::params::load(
        "traj_gen.toml"
    ).wrap_err("Could not load trajectory params")?;

    info!("Exec parameters loaded");

    // ---- BUILD TRAJECTORY ----

    let table = TrajectoryTable::build(&traj_params)
        .wrap_err("Failed to build the trajectory table")?;

    info!(
        "Trajectory table built: {} steps of {:.3} s, radius {} m, offset {} m",
        table.steps(),
        table.dt_s(),
        traj_params.radius_m,
        traj_params.z_offset_m
    );

    session.save("traj_gen/table.json", table.clone());

    let cycle_period = Duration::from_secs_f64(table.dt_s());

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    let mut streamer = Streamer::init(
        streamer::InitData {
            table,
            archive_setpoints: exec_params.archive_setpoints
        },
        &session
    ).wrap_err("Failed to initialise Streamer")?;
    info!("Streamer init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let fmu_client = FmuClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the FmuClient")?;
    info!("FmuClient initialised");

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    match opts.duration {
        Some(d) => info!("Begining main loop, stopping after {:.1} s\n", d),
        None => info!("Begining main loop\n")
    }

    let loop_start_instant = Instant::now();

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        if let Some(d) = opts.duration {
            if (cycle_start_instant - loop_start_instant).as_secs_f64() >= d {
                info!("Run duration elapsed, stopping");
                break
            }
        }

        // ---- DATA INPUT ----

        ds.cycle_start(fmu_client.offboard_enabled(), monotonic_micros());
        ds.set_fmu_in_peers(fmu_client.num_fmu_in_peers());

        // ---- STREAMER PROCESSING ----

        match streamer.proc(&ds.streamer_input) {
            Ok((o, r)) => {
                ds.streamer_output = o;
                ds.streamer_status_rpt = r;
            },
            Err(e) => match e {}
        }

        // ---- PUBLISH ----

        ds.check_setpoints_heard();

        if let Some(ref ocm) = ds.streamer_output.control_mode {
            if let Err(e) = fmu_client.publish(ocm) {
                ds.num_publish_errors += 1;
                warn!("Could not publish the offboard control mode: {}", e);
            }
        }

        if let Some(ref sp) = ds.streamer_output.setpoint {
            if let Err(e) = fmu_client.publish(sp) {
                ds.num_publish_errors += 1;
                warn!("Could not publish the trajectory setpoint: {}", e);
            }
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = streamer.write() {
            warn!("Could not archive the streamer: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;

                if ds.num_consec_cycle_overruns == exec_params.max_consec_overruns_warn {
                    error!(
                        "{} consecutive cycle overruns, setpoints are being streamed late",
                        ds.num_consec_cycle_overruns
                    );
                }
            }
        }

        ds.cycle_end();
    }

    // ---- SHUTDOWN ----

    info!(
        "Executed {} cycles in {:.1} s, final cursor {}",
        ds.num_cycles,
        ds.session_time_s,
        ds.streamer_status_rpt.cursor
    );

    if ds.num_publish_errors > 0 {
        warn!("{} messages could not be published", ds.num_publish_errors);
    }

    fmu_client.shutdown();

    info!("End of execution");

    session.exit();

    Ok(())
}
