//! Vehicle control mode publisher
//!
//! Stands in for the autopilot bridge by publishing `VehicleControlMode` messages, so that the
//! offboard executable can be exercised without a vehicle.

use std::time::{Duration, Instant};

use chrono::Utc;
use comms_if::{
    fmu::VehicleControlMode,
    net::{topic, MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "fmu_mode_pub", about = "Publish vehicle control mode messages")]
struct Opts {
    /// Endpoint to bind the publisher to
    #[structopt(short, long, default_value = "tcp://*:5011")]
    endpoint: String,

    /// Report offboard control as enabled
    #[structopt(long)]
    offboard: bool,

    /// If set, invert the offboard flag every this many seconds
    #[structopt(long)]
    toggle_s: Option<f64>,

    /// Publishing period in milliseconds
    #[structopt(long, default_value = "100")]
    period_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    // Create zmq context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        send_timeout: 0,
        ..Default::default()
    };

    // Create the socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::PUB,
        socket_options,
        &opts.endpoint
    )?;

    println!("Vehicle control mode publisher open on {}", opts.endpoint);

    let mut offboard = opts.offboard;
    let mut last_toggle = Instant::now();
    let mut num_peers = 0;

    loop {
        if socket.num_peers() != num_peers {
            num_peers = socket.num_peers();
            println!("Subscribers connected: {}", num_peers);
        }

        if let Some(toggle_s) = opts.toggle_s {
            if last_toggle.elapsed() >= Duration::from_secs_f64(toggle_s) {
                offboard = !offboard;
                last_toggle = Instant::now();
                println!("Offboard enabled: {}", offboard);
            }
        }

        let msg = VehicleControlMode {
            timestamp: Utc::now().timestamp_micros() as u64,
            flag_armed: true,
            flag_control_offboard_enabled: offboard,
            flag_control_position_enabled: offboard,
            ..Default::default()
        };

        match socket.send(topic::encode(&msg)?.as_bytes(), 0) {
            Ok(_) => (),
            Err(e) => println!("Failed to send vehicle control mode: {}", e)
        }

        std::thread::sleep(Duration::from_millis(opts.period_ms));
    }
}
