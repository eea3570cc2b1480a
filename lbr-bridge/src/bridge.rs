//! Telemetry bridge: supervised connection plus fixed-period publisher
//!
//! # Thread Model
//!
//! ```text
//! ┌──────────────────┐  spawn (never blocks on network)
//! │ Lifecycle caller │──────────────┐
//! └────────┬─────────┘              ▼
//!          │ close()      ┌─────────────────────┐
//!          │ (any thread) │  lbr-bridge worker  │
//!          ▼              │                     │
//!   ShutdownFlag ────────▶│ Monitoring ◀──┐     │
//!                         │     │ connected│    │
//!                         │     ▼          │lost│
//!                         │ Streaming ─────┘    │
//!                         └─────────────────────┘
//! ```
//!
//! The worker alternates between supervising the connection and running
//! the publisher loop; both roles check the shutdown flag at every loop
//! boundary. The flag is the only mutable state shared with the caller.
//! `close()` sets it and then waits until the worker has released the
//! transport, so a closed bridge performs no further socket activity.

use crate::config::{Config, RetryPolicy};
use crate::connection::ConnectionManager;
use crate::core::source::RobotStateSource;
use crate::core::types::{ConnectionState, Transition};
use crate::devices::create_source;
use crate::error::Result;
use crate::sampler::Sampler;
use crate::shutdown::ShutdownFlag;
use crate::streaming::frame::{FloatFormat, FrameEncoder};
use crate::streaming::publisher::{PublishExit, PublisherLoop};
use crate::transport::{create_transport, Transport};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{error, info};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Capacity of the transition channel; older transitions are dropped beyond it
const TRANSITION_CAPACITY: usize = 256;

/// Runtime parameters of a bridge instance
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub tick_period: Duration,
    pub retry: RetryPolicy,
    pub dof: usize,
    pub float_format: FloatFormat,
}

impl BridgeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_period: config.publisher.tick_period(),
            retry: config.retry.clone(),
            dof: config.robot.dof,
            float_format: FloatFormat::from_decimals(config.publisher.float_decimals),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Handle to a running telemetry bridge
///
/// Single-use: once closed it cannot be restarted. Dropping the handle
/// closes the bridge.
pub struct Bridge {
    shutdown: ShutdownFlag,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    /// Disconnects when the worker exits
    finished: Receiver<()>,
    transitions: Mutex<Option<Receiver<Transition>>>,
}

impl Bridge {
    /// Validate configuration, build transport, state source and settings
    /// from it and start the bridge
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = create_transport(&config.network);
        let source = create_source(config);
        Self::spawn(transport, source, BridgeSettings::from_config(config))
    }

    /// Start the bridge with a fresh shutdown flag
    pub fn spawn(
        transport: Box<dyn Transport>,
        source: Box<dyn RobotStateSource>,
        settings: BridgeSettings,
    ) -> Result<Self> {
        Self::spawn_with_shutdown(transport, source, settings, ShutdownFlag::new())
    }

    /// Start the bridge observing an existing shutdown flag
    ///
    /// Returns as soon as the worker thread is running; connecting happens
    /// in the background.
    pub fn spawn_with_shutdown(
        transport: Box<dyn Transport>,
        source: Box<dyn RobotStateSource>,
        settings: BridgeSettings,
        shutdown: ShutdownFlag,
    ) -> Result<Self> {
        let (transition_tx, transition_rx) = bounded(TRANSITION_CAPACITY);
        let (done_tx, finished) = bounded::<()>(0);

        let endpoint = transport.describe();
        let conn = ConnectionManager::new(transport, settings.retry.clone(), shutdown.clone())
            .with_transitions(transition_tx);
        let publisher = PublisherLoop::new(
            Sampler::new(source, settings.dof),
            FrameEncoder::new(settings.float_format),
            settings.tick_period,
            shutdown.clone(),
        );

        let worker_shutdown = shutdown.clone();
        let worker = thread::Builder::new()
            .name("lbr-bridge".to_string())
            .spawn(move || run_worker(conn, publisher, worker_shutdown, done_tx))?;

        info!(
            "Telemetry bridge started ({}, {} joints, tick {:?})",
            endpoint, settings.dof, settings.tick_period
        );

        Ok(Self {
            shutdown,
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
            finished,
            transitions: Mutex::new(Some(transition_rx)),
        })
    }

    /// Stop the bridge and release the transport
    ///
    /// Safe to call any number of times, concurrently, from any thread. When
    /// it returns the worker has exited and the socket is closed.
    pub fn close(&self) {
        if self.shutdown.request() {
            info!("Telemetry bridge closing");
        }
        if thread::current().id() == self.worker_id {
            // Called from inside the worker (e.g. by a state source); it
            // observes the flag at its next loop boundary
            return;
        }

        // Err(Disconnected) once the worker has dropped its sender
        let _ = self.finished.recv();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("Telemetry bridge worker panicked");
            }
        }
    }

    /// Whether close has been requested
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Clone of the bridge's shutdown flag
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Take the receiving end of the connection-state transition channel
    ///
    /// Only the first call gets the receiver.
    pub fn take_transitions(&self) -> Option<Receiver<Transition>> {
        self.transitions.lock().take()
    }

    /// Wait up to `timeout` for the worker to exit; `true` if it has
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        matches!(
            self.finished.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.close();
    }
}

/// Worker body: supervise, stream, repeat until shutdown
fn run_worker(
    mut conn: ConnectionManager,
    mut publisher: PublisherLoop,
    shutdown: ShutdownFlag,
    _done: Sender<()>,
) {
    if conn.is_connected() {
        info!("Transport already connected, streaming");
    }

    while !shutdown.is_requested() {
        if !conn.is_connected() {
            match conn.supervise_until_connected() {
                ConnectionState::Connected => info!("Connection with remote consumer OK"),
                _ => break,
            }
        }

        match publisher.run(&mut conn) {
            PublishExit::Shutdown => break,
            PublishExit::TransportLost => info!("Streaming interrupted, reconnecting"),
        }
    }

    conn.close();
    let stats = publisher.stats();
    info!(
        "Telemetry bridge stopped ({} frames sent, {} ticks skipped, {} write failures)",
        stats.frames_sent, stats.ticks_skipped, stats.write_failures
    );
}
