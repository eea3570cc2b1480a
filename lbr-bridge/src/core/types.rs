//! Core data types for robot state and connection lifecycle.
//!
//! - [`StateSnapshot`]: Immutable joint state captured by the sampler
//! - [`ConnectionState`]: Lifecycle of the outbound transport
//! - [`Transition`]: One observed change of [`ConnectionState`]

use crate::error::{Error, Result};
use std::fmt;

/// Lifecycle of the outbound connection
///
/// `Closed` is terminal and reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport held, a retry is pending
    Disconnected,
    /// A single connection attempt is in flight
    Connecting,
    /// Transport established, frames may be written
    Connected,
    /// Shutdown requested; no further socket activity
    Closed,
}

impl ConnectionState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Disconnected, Closed)
                | (Connecting, Closed)
                | (Connected, Closed)
        )
    }

    /// Whether this is the terminal state
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A state change published by the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Immutable robot state reading
///
/// Position and torque vectors always have the same length (one entry per
/// joint). Fields are private so a snapshot cannot change after capture.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    positions: Vec<f64>,
    torques: Vec<f64>,
    timestamp_ns: u64,
}

impl StateSnapshot {
    /// Create a snapshot, rejecting mismatched vector lengths
    pub fn new(positions: Vec<f64>, torques: Vec<f64>, timestamp_ns: u64) -> Result<Self> {
        if positions.len() != torques.len() {
            return Err(Error::InvalidParameter(format!(
                "position/torque length mismatch: {} vs {}",
                positions.len(),
                torques.len()
            )));
        }
        Ok(Self {
            positions,
            torques,
            timestamp_ns,
        })
    }

    /// Joint positions (rad), in joint order
    #[inline]
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Measured joint torques (Nm), in joint order
    #[inline]
    pub fn torques(&self) -> &[f64] {
        &self.torques
    }

    /// Monotonic capture time in nanoseconds
    #[inline]
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// Number of joints
    #[inline]
    pub fn dof(&self) -> usize {
        self.positions.len()
    }
}
