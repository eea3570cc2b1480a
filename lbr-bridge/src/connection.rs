//! Connection lifecycle for the outbound telemetry link
//!
//! The [`ConnectionManager`] owns the transport and the
//! [`ConnectionState`] machine:
//!
//! ```text
//!                 ┌──────────────┐  attempt   ┌────────────┐
//!   ┌────────────▶│ Disconnected │───────────▶│ Connecting │
//!   │             └──────────────┘◀───────────└─────┬──────┘
//!   │ write failure              failed, backoff    │ established
//!   │             ┌──────────────┐                  │
//!   └─────────────│  Connected   │◀─────────────────┘
//!                 └──────────────┘
//!           any state ──close / shutdown──▶ Closed (terminal)
//! ```
//!
//! Every change is published as a [`Transition`] on an optional bounded
//! channel. Publishing never blocks: if the consumer lags, transitions are
//! dropped.
//!
//! # Retry accounting
//!
//! A failed connect and a lost link both count as consecutive failures, and
//! every attempt after a failure waits `retry.delay(failures)` first. The
//! counter resets only once a link has carried frames for at least one base
//! retry interval. A datagram link to a dead consumer connects fine and then
//! fails on its first writes, so it never resets the counter and the
//! reconnect rate stays bounded by the retry policy.

use crate::config::RetryPolicy;
use crate::core::types::{ConnectionState, Transition};
use crate::error::{Error, Result};
use crate::shutdown::ShutdownFlag;
use crate::streaming::frame::Frame;
use crate::transport::Transport;
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, warn};
use std::time::Instant;

/// Owns the transport and drives connection attempts
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    state: ConnectionState,
    retry: RetryPolicy,
    shutdown: ShutdownFlag,
    transitions: Option<Sender<Transition>>,
    consecutive_failures: u32,
    /// When the current link was established
    connected_at: Option<Instant>,
}

impl ConnectionManager {
    /// Wrap a transport; a transport that is already connected starts in
    /// `Connected`
    pub fn new(transport: Box<dyn Transport>, retry: RetryPolicy, shutdown: ShutdownFlag) -> Self {
        let already_connected = transport.is_connected();
        let state = if already_connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        Self {
            transport,
            state,
            retry,
            shutdown,
            transitions: None,
            consecutive_failures: 0,
            connected_at: already_connected.then(Instant::now),
        }
    }

    /// Publish state transitions on `tx`
    pub fn with_transitions(mut self, tx: Sender<Transition>) -> Self {
        self.transitions = Some(tx);
        self
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the link is established and usable
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_connected()
    }

    /// Make exactly one connection attempt
    ///
    /// Returns `Connected` on success and `Disconnected` on any network
    /// failure. If shutdown was requested while the attempt was in flight,
    /// the new socket is released at once and `Closed` is returned.
    pub fn connect(&mut self) -> ConnectionState {
        if self.state == ConnectionState::Closed {
            return ConnectionState::Closed;
        }
        if self.shutdown.is_requested() {
            self.close();
            return ConnectionState::Closed;
        }
        if self.state == ConnectionState::Connected {
            // Replacing a live link: drop it first so the old socket never leaks
            self.transport.close();
            self.set_state(ConnectionState::Disconnected);
        }

        self.set_state(ConnectionState::Connecting);
        match self.transport.connect() {
            Ok(()) => {
                if self.shutdown.is_requested() {
                    debug!("Shutdown requested during connect; releasing new socket");
                    self.close();
                    return ConnectionState::Closed;
                }
                self.connected_at = Some(Instant::now());
                self.set_state(ConnectionState::Connected);
                if self.consecutive_failures == 0 {
                    info!("Connected to {}", self.transport.describe());
                } else {
                    debug!(
                        "Connected to {} ({} failures so far)",
                        self.transport.describe(),
                        self.consecutive_failures
                    );
                }
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                // A failed attempt may still have left a half-open handle
                self.transport.close();
                self.set_state(ConnectionState::Disconnected);
                if self.consecutive_failures == 1 {
                    warn!("Connection to {} failed: {}", self.transport.describe(), e);
                } else {
                    debug!(
                        "Connection to {} failed (attempt #{}): {}",
                        self.transport.describe(),
                        self.consecutive_failures,
                        e
                    );
                }
            }
        }
        self.state
    }

    /// Retry until connected or shutdown is requested
    ///
    /// Returns `Connected` or `Closed`; never anything else.
    pub fn supervise_until_connected(&mut self) -> ConnectionState {
        info!(
            "Waiting for connection to {} ...",
            self.transport.describe()
        );
        loop {
            if self.shutdown.is_requested() {
                self.close();
                return ConnectionState::Closed;
            }

            if self.consecutive_failures > 0 {
                let delay = self.retry.delay(self.consecutive_failures);
                if self.consecutive_failures % 10 == 0 {
                    info!(
                        "Still waiting for {} ({} consecutive failures, retry in {:?})",
                        self.transport.describe(),
                        self.consecutive_failures,
                        delay
                    );
                }
                if !self.shutdown.sleep(delay) {
                    self.close();
                    return ConnectionState::Closed;
                }
            }

            match self.connect() {
                ConnectionState::Connected => return ConnectionState::Connected,
                ConnectionState::Closed => return ConnectionState::Closed,
                _ => {}
            }
        }
    }

    /// Write one frame
    ///
    /// A failed write is not retried: the link is released, the state drops
    /// to `Disconnected` and the error is returned for logging.
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        match self.transport.send(frame.as_bytes()) {
            Ok(()) => {
                if self.consecutive_failures > 0 && self.link_is_stable() {
                    debug!(
                        "Link to {} stable, clearing {} failures",
                        self.transport.describe(),
                        self.consecutive_failures
                    );
                    self.consecutive_failures = 0;
                }
                Ok(())
            }
            Err(e) => {
                self.mark_disconnected();
                Err(e)
            }
        }
    }

    /// Release the link after a transport failure
    ///
    /// The loss counts as a consecutive failure, so the next attempt waits
    /// for the retry delay.
    pub fn mark_disconnected(&mut self) {
        if self.state == ConnectionState::Connected {
            self.transport.close();
            self.connected_at = None;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Whether the current link has been up for at least one base retry interval
    fn link_is_stable(&self) -> bool {
        self.connected_at
            .is_some_and(|at| at.elapsed() >= self.retry.delay(1))
    }

    /// Release the link and enter the terminal `Closed` state (idempotent)
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.transport.close();
        self.connected_at = None;
        self.set_state(ConnectionState::Closed);
    }

    /// Failed attempts and lost links since the last stable link
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn set_state(&mut self, next: ConnectionState) {
        let prev = self.state;
        if prev == next {
            return;
        }
        debug_assert!(
            prev.can_transition_to(next),
            "illegal transition {} -> {}",
            prev,
            next
        );
        self.state = next;
        debug!("Connection state: {} -> {}", prev, next);

        if let Some(tx) = &self.transitions {
            match tx.try_send(Transition { from: prev, to: next }) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("Transition channel full, dropping {} -> {}", prev, next)
                }
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
