//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, the networking library chosen for the
//! software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Topic framing for publish-subscribe messages
pub mod topic;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, AtomicUsize, Ordering}}, thread};
use serde::Deserialize;
use zmq::{Socket, Context, SocketType, SocketEvent};
use log::{debug, error};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout of the monitor socket. This bounds how long the monitor thread takes to notice
/// a shutdown request.
const MONITOR_POLL_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Number of monitors created so far, gives each monitor a unique inproc endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoints used by the offboard executable.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint the offboard executable publishes `/fmu/in/*` messages on.
    pub fmu_in_endpoint: String,

    /// Endpoint of the autopilot bridge publishing `/fmu/out/*` messages.
    pub fmu_out_endpoint: String,
}

/// A zmq socket which keeps count of its connected peers.
///
/// The socket's monitor events are read on a background thread. Each accepted or established
/// connection adds a peer, each disconnection removes one. A bound publisher therefore knows
/// whether anything is listening to it.
pub struct MonitoredSocket {
    socket: Socket,

    monitor_jh: Option<thread::JoinHandle<()>>,

    monitor_endpoint: String,

    shutdown: Arc<AtomicBool>,

    peers: Arc<AtomicUsize>
}

/// Options applied to a monitored socket.
///
/// The zmq options follow the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation.
#[derive(Debug, Clone)]
pub struct SocketOptions {

    /// Bind to the endpoint rather than connect to it.
    ///
    /// Default: `false`
    pub bind: bool,

    /// Block in `MonitoredSocket::new()` until the first connection is made. Fails with
    /// `MonitoredSocketError::CouldNotConnect` if zmq reports anything but a (delayed)
    /// connection first.
    ///
    /// Default: `true`
    pub block_on_first_connect: bool,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`: Set reconnection interval
    pub reconnect_ivl: i32,

    /// `ZMQ_RECONNECT_IVL_MAX`: Set maximum reconnection interval
    pub reconnect_ivl_max: i32,

    /// `ZMQ_CONNECT_TIMEOUT`: Set `connect()` timeout
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_SNDHWM`: Set high water mark for outbound messages
    pub send_hwm: i32,

    /// `ZMQ_RCVHWM`: Set high water mark for inbound messages
    pub recv_hwm: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a new monitored socket of the given type on `endpoint`, for example
    /// `"tcp://localhost:5010"`.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let peers = Arc::new(AtomicUsize::new(0));

        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // Monitor events are published on a pair socket at a unique inproc endpoint
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );
        socket.monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor.connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        socket_options.set(&socket)?;

        match socket_options.bind {
            false => socket.connect(endpoint),
            true => socket.bind(endpoint)
        }.map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        if socket_options.block_on_first_connect {
            loop {
                match read_event(&monitor).map_err(MonitoredSocketError::EventReadError)? {
                    SocketEvent::CONNECTED => break,
                    SocketEvent::CONNECT_DELAYED => continue,
                    _ => return Err(MonitoredSocketError::CouldNotConnect(None))
                }
            }

            peers.store(1, Ordering::Relaxed);
        }

        // From here on the monitor polls so the thread can observe a shutdown request
        monitor.set_rcvtimeo(MONITOR_POLL_TIMEOUT_MS)
            .map_err(|e| MonitoredSocketError::SocketOptionError("set_rcvtimeo".into(), e))?;

        let monitor_jh = {
            let shutdown = shutdown.clone();
            let peers = peers.clone();
            let endpoint = monitor_endpoint.clone();

            thread::spawn(move || monitor_thread(monitor, endpoint, shutdown, peers))
        };

        Ok(Self {
            socket,
            monitor_jh: Some(monitor_jh),
            monitor_endpoint,
            shutdown,
            peers
        })
    }

    /// Number of peers currently connected to the socket.
    pub fn num_peers(&self) -> usize {
        self.peers.load(Ordering::Relaxed)
    }

    /// Return if the socket has at least one peer.
    pub fn connected(&self) -> bool {
        self.num_peers() > 0
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.monitor_jh.take() {
            if jh.join().is_err() {
                error!("Monitor thread for {} panicked", self.monitor_endpoint);
            }
        }

        debug!("Monitor {} stopped", self.monitor_endpoint);
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_reconnect_ivl_max, self.reconnect_ivl_max),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout),
            (set_sndhwm, self.send_hwm),
            (set_rcvhwm, self.recv_hwm)
        );

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // zmq's own defaults, except for blocking on the first connection
        Self {
            bind: false,
            block_on_first_connect: true,
            connect_timeout: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            reconnect_ivl_max: 0,
            recv_timeout: -1,
            send_timeout: -1,
            send_hwm: 1000,
            recv_hwm: 1000
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read an event from a monitor socket.
fn read_event(socket: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = socket.recv_msg(0)?;

    if msg.len() < 2 {
        return Err(zmq::Error::EINVAL)
    }

    let event = u16::from_ne_bytes([msg[0], msg[1]]);

    // The second frame holds the peer address, which isn't needed
    if !socket.get_rcvmore()? {
        return Err(zmq::Error::EINVAL)
    }
    let _ = socket.recv_msg(0)?;

    Ok(SocketEvent::from_raw(event))
}

/// Change in the peer count caused by a monitor event.
fn peer_delta(event: SocketEvent) -> isize {
    match event {
        SocketEvent::CONNECTED | SocketEvent::ACCEPTED => 1,
        SocketEvent::DISCONNECTED => -1,
        _ => 0
    }
}

fn monitor_thread(
    monitor: Socket,
    monitor_endpoint: String,
    shutdown: Arc<AtomicBool>,
    peers: Arc<AtomicUsize>
) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => continue,
            Err(e) => {
                error!("Error reading event from monitor {}: {}", monitor_endpoint, e);
                break
            }
        };

        // This thread is the only writer
        let n = peers.load(Ordering::Relaxed);
        match peer_delta(event) {
            1 => peers.store(n + 1, Ordering::Relaxed),
            -1 => peers.store(n.saturating_sub(1), Ordering::Relaxed),
            _ => ()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::{Duration, Instant};

    /// Wait for a condition to hold, polling the monitor's count.
    fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if cond() {
                return true
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_peer_delta() {
        assert_eq!(peer_delta(SocketEvent::ACCEPTED), 1);
        assert_eq!(peer_delta(SocketEvent::CONNECTED), 1);
        assert_eq!(peer_delta(SocketEvent::DISCONNECTED), -1);
        assert_eq!(peer_delta(SocketEvent::LISTENING), 0);
        assert_eq!(peer_delta(SocketEvent::CONNECT_DELAYED), 0);
    }

    #[test]
    fn test_bound_socket_counts_peers() {
        let ctx = zmq::Context::new();

        let publisher = MonitoredSocket::new(
            &ctx,
            zmq::PUB,
            SocketOptions {
                bind: true,
                block_on_first_connect: false,
                linger: 0,
                ..Default::default()
            },
            "tcp://127.0.0.1:*"
        ).unwrap();
        assert!(!publisher.connected());

        let endpoint = publisher.get_last_endpoint().unwrap().unwrap();

        let first = ctx.socket(zmq::SUB).unwrap();
        first.set_linger(0).unwrap();
        first.connect(&endpoint).unwrap();
        let second = ctx.socket(zmq::SUB).unwrap();
        second.set_linger(0).unwrap();
        second.connect(&endpoint).unwrap();

        assert!(wait_for(|| publisher.num_peers() == 2));
        assert!(publisher.connected());

        drop(first);
        assert!(wait_for(|| publisher.num_peers() == 1));

        drop(second);
        assert!(wait_for(|| publisher.num_peers() == 0));
        assert!(!publisher.connected());
    }
}
