//! UDP datagram transport
//!
//! Each frame is sent as one datagram to a connected UDP socket. There is no
//! handshake, so `connect` only binds an ephemeral local port and fixes the
//! peer address; an unreachable consumer shows up later as a send error
//! (ICMP port unreachable reported on the connected socket).

use super::Transport;
use crate::error::{Error, Result};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Datagram transport to the remote consumer
pub struct UdpTransport {
    host: String,
    port: u16,
    write_timeout: Duration,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(host: String, port: u16, write_timeout: Duration) -> Self {
        Self {
            host,
            port,
            write_timeout,
            socket: None,
        }
    }

    fn open(&self) -> io::Result<UdpSocket> {
        let target = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", self.host))
            })?;

        let local = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local)?;
        socket.set_write_timeout(Some(self.write_timeout))?;
        socket.connect(target)?;
        Ok(socket)
    }
}

impl Transport for UdpTransport {
    fn connect(&mut self) -> Result<()> {
        self.close();
        self.socket = Some(self.open()?);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;
        let sent = socket.send(data)?;
        if sent != data.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram: {} of {} bytes", sent, data.len()),
            )));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn describe(&self) -> String {
        format!("udp://{}:{}", self.host, self.port)
    }
}
