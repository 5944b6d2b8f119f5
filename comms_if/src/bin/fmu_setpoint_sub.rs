//! Offboard message subscriber
//!
//! Prints the control mode declarations and trajectory setpoints published by the offboard
//! executable.

use comms_if::{
    fmu::{
        FmuMessage, OffboardControlMode, TrajectorySetpoint, OFFBOARD_CONTROL_MODE_TOPIC,
        TRAJECTORY_SETPOINT_TOPIC
    },
    net::{topic, MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "fmu_setpoint_sub", about = "Print offboard messages")]
struct Opts {
    /// Endpoint of the offboard executable's publisher
    #[structopt(short, long, default_value = "tcp://localhost:5010")]
    endpoint: String,

    /// Do not print control mode declarations
    #[structopt(long)]
    setpoints_only: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    // Create context
    let ctx = zmq::Context::new();

    // Create socket options, the executable may not be running yet
    let socket_options = SocketOptions {
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        socket_options,
        &opts.endpoint
    )?;

    socket.set_subscribe(TrajectorySetpoint::TOPIC.as_bytes())?;
    if !opts.setpoints_only {
        socket.set_subscribe(OffboardControlMode::TOPIC.as_bytes())?;
    }

    // Recieve messages from publisher
    loop {
        let frame = match socket.recv_string(0)? {
            Ok(s) => s,
            Err(_) => {
                println!("Got non UTF-8 message");
                continue
            }
        };

        match topic::split(&frame)?.0 {
            TRAJECTORY_SETPOINT_TOPIC => {
                let sp: TrajectorySetpoint = topic::decode(&frame)?;
                println!(
                    "[{:>12}] x:{:7.3} y:{:7.3} z:{:7.3} yaw:{:7.1}",
                    sp.timestamp,
                    sp.position[0],
                    sp.position[1],
                    sp.position[2],
                    sp.yaw.to_degrees()
                );
            },
            OFFBOARD_CONTROL_MODE_TOPIC => {
                let ocm: OffboardControlMode = topic::decode(&frame)?;
                println!("[{:>12}] {:?}", ocm.timestamp, ocm);
            },
            t => println!("Got message on unexpected topic {}", t)
        }
    }
}
