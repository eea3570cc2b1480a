//! Transport layer for the outbound telemetry link
//!
//! The connection manager only sees the [`Transport`] capability set, so the
//! stream ([`TcpTransport`]) and datagram ([`UdpTransport`]) variants can be
//! swapped by configuration without touching the publisher or sampler.

use crate::config::NetworkConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod mock;
mod tcp;
mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// Transport trait for the outbound link
pub trait Transport: Send {
    /// Make exactly one attempt to establish the link
    ///
    /// Any previously held socket is released first. Must be bounded by an
    /// I/O timeout. Host name resolution runs before that timeout starts and
    /// is bounded only by the system resolver; use a literal IP address when
    /// the attempt must stay within the configured connect timeout.
    fn connect(&mut self) -> Result<()>;

    /// Write one complete frame
    ///
    /// Returns [`Error::NotConnected`](crate::error::Error::NotConnected)
    /// when no socket is held.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Release the socket if held (idempotent)
    fn close(&mut self);

    /// Whether a socket is currently held
    fn is_connected(&self) -> bool;

    /// Human-readable endpoint for log lines
    fn describe(&self) -> String;
}

/// Transport kind selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Reliable byte stream
    #[default]
    Tcp,
    /// Fire-and-forget datagrams, one frame per datagram
    Udp,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Tcp => f.write_str("TCP"),
            ConnectionType::Udp => f.write_str("UDP"),
        }
    }
}

/// Create the transport selected by `config.connection_type`
pub fn create_transport(config: &NetworkConfig) -> Box<dyn Transport> {
    match config.connection_type {
        ConnectionType::Tcp => Box::new(TcpTransport::new(
            config.host.clone(),
            config.port,
            config.connect_timeout(),
            config.write_timeout(),
        )),
        ConnectionType::Udp => Box::new(UdpTransport::new(
            config.host.clone(),
            config.port,
            config.write_timeout(),
        )),
    }
}
