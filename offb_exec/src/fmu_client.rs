//! # FMU Client
//!
//! The FmuClient connects the offboard executable to the autopilot bridge. Messages destined for
//! the autopilot (`/fmu/in/*`) are published on a bound PUB socket, while the vehicle control mode
//! published by the bridge (`/fmu/out/vehicle_control_mode`) is received by a background thread.
//!
//! Only the offboard control enabled flag of the vehicle control mode is kept. It is stored in an
//! atomic so that the main loop can read the latest value each cycle without ever waiting on the
//! background thread.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, thread::{self, JoinHandle}};
use log::{debug, error, info, warn};

use comms_if::{
    fmu::{FmuMessage, VehicleControlMode},
    net::{MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions, topic, zmq}
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of outbound messages queued before new ones are dropped.
const FMU_IN_SEND_HWM: i32 = 10;

/// Maximum number of inbound messages queued before old ones are dropped.
const FMU_OUT_RECV_HWM: i32 = 5;

/// Receive timeout of the background thread, bounds how long shutdown takes.
const FMU_OUT_RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FmuClient {
    fmu_in: MonitoredSocket,
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    offboard_enabled: Arc<AtomicBool>
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What the background thread does after a receive.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RecvAction {
    Continue,
    Stop,
}

#[derive(Debug, thiserror::Error)]
pub enum FmuClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the message to the autopilot: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FmuClient {
    /// Create a new instance of the FmuClient.
    ///
    /// Neither socket waits for a peer, the bridge may start before or after the executable.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, FmuClientError> {
        // Outbound, a full queue drops messages rather than stalling the cycle
        let fmu_in_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 1,
            send_timeout: 0,
            send_hwm: FMU_IN_SEND_HWM,
            ..Default::default()
        };

        let fmu_in = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            fmu_in_options,
            &params.fmu_in_endpoint
        ).map_err(FmuClientError::SocketError)?;

        // Inbound
        let fmu_out_options = SocketOptions {
            block_on_first_connect: false,
            linger: 1,
            recv_timeout: FMU_OUT_RECV_TIMEOUT_MS,
            recv_hwm: FMU_OUT_RECV_HWM,
            ..Default::default()
        };

        let fmu_out = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            fmu_out_options,
            &params.fmu_out_endpoint
        ).map_err(FmuClientError::SocketError)?;

        fmu_out.set_subscribe(VehicleControlMode::TOPIC.as_bytes())
            .map_err(|e| FmuClientError::SocketError(
                MonitoredSocketError::SocketOptionError("set_subscribe".into(), e)
            ))?;

        info!(
            "FmuClient publishing on {}, subscribed to {}",
            params.fmu_in_endpoint, params.fmu_out_endpoint
        );

        // Create the shared objects
        let bg_run = Arc::new(AtomicBool::new(true));
        let offboard_enabled = Arc::new(AtomicBool::new(false));

        // Create clones of these to pass to the bg thread
        let bg_run_clone = bg_run.clone();
        let offboard_enabled_clone = offboard_enabled.clone();

        // Start BG thread
        let bg_jh = Some(thread::spawn(move || {
            bg_thread(fmu_out, bg_run_clone, offboard_enabled_clone)
        }));

        Ok(Self {
            fmu_in,
            bg_jh,
            bg_run,
            offboard_enabled
        })
    }

    /// Get the latest offboard control enabled flag published by the autopilot.
    ///
    /// Returns `false` until the first vehicle control mode message is received.
    pub fn offboard_enabled(&self) -> bool {
        self.offboard_enabled.load(Ordering::Relaxed)
    }

    /// Publish a message to the autopilot on the message's topic.
    pub fn publish<M: FmuMessage>(&self, msg: &M) -> Result<(), FmuClientError> {
        let frame = topic::encode(msg)
            .map_err(FmuClientError::SerializationError)?;

        self.fmu_in.send(frame.as_bytes(), 0)
            .map_err(FmuClientError::SendError)
    }

    /// Number of subscribers connected to the outbound socket.
    pub fn num_fmu_in_peers(&self) -> usize {
        self.fmu_in.num_peers()
    }

    /// Stop the background thread and close the sockets.
    pub fn shutdown(mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("FmuClient background thread panicked");
            }
        }

        info!("FmuClient shut down");
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, updates the offboard enabled flag when the bridge publishes a new vehicle
/// control mode.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    offboard_enabled: Arc<AtomicBool>
) {
    // While instructed to run
    while run.load(Ordering::Relaxed) {
        if handle_recv(socket.recv_string(0), &offboard_enabled) == RecvAction::Stop {
            break
        }
    }
}

/// Apply the result of one receive from the bridge to the offboard enabled flag.
///
/// If the socket fails the mode signal is lost for good, so the flag is dropped to `false` and
/// the streamer stops publishing setpoints.
fn handle_recv(
    result: Result<Result<String, Vec<u8>>, zmq::Error>,
    offboard_enabled: &AtomicBool
) -> RecvAction {
    let msg = match result {
        Ok(Ok(s)) => s,
        Ok(Err(_)) => {
            warn!("Non UTF-8 message from the autopilot bridge");
            return RecvAction::Continue
        },
        Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => return RecvAction::Continue,
        Err(e) => {
            error!(
                "Error receiving message from the autopilot bridge, offboard control will be \
                 treated as disabled: {:?}",
                e
            );
            offboard_enabled.store(false, Ordering::Relaxed);
            return RecvAction::Stop
        }
    };

    let mode: VehicleControlMode = match topic::decode(&msg) {
        Ok(m) => m,
        Err(e) => {
            warn!("Error decoding message from the autopilot bridge: {}", e);
            return RecvAction::Continue
        }
    };

    let prev = offboard_enabled.swap(mode.flag_control_offboard_enabled, Ordering::Relaxed);
    if prev != mode.flag_control_offboard_enabled {
        debug!("Vehicle offboard control enabled: {}", mode.flag_control_offboard_enabled);
    }

    RecvAction::Continue
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::fmu::TrajectorySetpoint;
    use std::time::{Duration, Instant};

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn inproc_params(name: &str) -> NetParams {
        NetParams {
            fmu_in_endpoint: format!("inproc://fmu_in_{}", name),
            fmu_out_endpoint: format!("inproc://fmu_out_{}", name),
        }
    }

    #[test]
    fn test_offboard_flag_follows_bridge() {
        let ctx = zmq::Context::new();
        let params = inproc_params("flag");

        let bridge = ctx.socket(zmq::PUB).unwrap();
        bridge.bind(&params.fmu_out_endpoint).unwrap();

        let client = FmuClient::new(&ctx, &params).unwrap();
        assert!(!client.offboard_enabled());

        let mode = VehicleControlMode {
            flag_control_offboard_enabled: true,
            ..Default::default()
        };
        let frame = topic::encode(&mode).unwrap();

        // Subscriptions take a moment to propagate so keep publishing
        let start = Instant::now();
        while !client.offboard_enabled() && start.elapsed() < TEST_TIMEOUT {
            bridge.send(frame.as_bytes(), 0).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(client.offboard_enabled());

        // A malformed message doesn't change the flag
        bridge.send("/fmu/out/vehicle_control_mode {not json".as_bytes(), 0).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(client.offboard_enabled());

        client.shutdown();
    }

    #[test]
    fn test_recv_error_clears_flag() {
        let flag = AtomicBool::new(false);

        let mode = VehicleControlMode {
            flag_control_offboard_enabled: true,
            ..Default::default()
        };
        let frame = topic::encode(&mode).unwrap();

        assert_eq!(handle_recv(Ok(Ok(frame)), &flag), RecvAction::Continue);
        assert!(flag.load(Ordering::Relaxed));

        // Timeouts, interrupts and junk leave the last value in place
        assert_eq!(handle_recv(Err(zmq::Error::EAGAIN), &flag), RecvAction::Continue);
        assert_eq!(handle_recv(Err(zmq::Error::EINTR), &flag), RecvAction::Continue);
        assert_eq!(handle_recv(Ok(Err(vec![0xff, 0xfe])), &flag), RecvAction::Continue);
        assert_eq!(
            handle_recv(Ok(Ok("/fmu/out/vehicle_control_mode {".into())), &flag),
            RecvAction::Continue
        );
        assert!(flag.load(Ordering::Relaxed));

        // A terminated context ends the thread and the enabled flag with it
        assert_eq!(handle_recv(Err(zmq::Error::ETERM), &flag), RecvAction::Stop);
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_fmu_in_peers() {
        let ctx = zmq::Context::new();
        let params = NetParams {
            fmu_in_endpoint: "tcp://127.0.0.1:*".into(),
            fmu_out_endpoint: "inproc://fmu_out_peers".into(),
        };

        let client = FmuClient::new(&ctx, &params).unwrap();
        assert_eq!(client.num_fmu_in_peers(), 0);

        let endpoint = client.fmu_in.get_last_endpoint().unwrap().unwrap();
        let sub = ctx.socket(zmq::SUB).unwrap();
        sub.set_linger(0).unwrap();
        sub.connect(&endpoint).unwrap();

        let start = Instant::now();
        while client.num_fmu_in_peers() == 0 && start.elapsed() < TEST_TIMEOUT {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(client.num_fmu_in_peers(), 1);

        drop(sub);
        client.shutdown();
    }

    #[test]
    fn test_publish_setpoint() {
        let ctx = zmq::Context::new();
        let params = inproc_params("publish");

        let client = FmuClient::new(&ctx, &params).unwrap();

        let sub = ctx.socket(zmq::SUB).unwrap();
        sub.connect(&params.fmu_in_endpoint).unwrap();
        sub.set_subscribe(TrajectorySetpoint::TOPIC.as_bytes()).unwrap();
        sub.set_rcvtimeo(10).unwrap();

        let sp = TrajectorySetpoint {
            timestamp: 1234,
            position: [1.0, 2.0, -5.0],
            ..Default::default()
        };

        let start = Instant::now();
        let received = loop {
            client.publish(&sp).unwrap();

            if let Ok(Ok(s)) = sub.recv_string(0) {
                break Some(s);
            }
            if start.elapsed() > TEST_TIMEOUT {
                break None;
            }
        };

        let received: TrajectorySetpoint = topic::decode(&received.unwrap()).unwrap();
        assert_eq!(received, sp);

        client.shutdown();
    }
}
