//! TCP stream transport

use super::Transport;
use crate::error::{Error, Result};
use log::debug;
use std::io::{self, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Outbound TCP connection to the remote consumer
///
/// Connect and write are both bounded by timeouts so a dead peer can never
/// stall the worker thread indefinitely. The connect timeout applies to each
/// resolved address in turn and does not cover the DNS lookup itself; a
/// literal IP host skips the resolver entirely.
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    write_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(host: String, port: u16, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            host,
            port,
            connect_timeout,
            write_timeout,
            stream: None,
        }
    }

    fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, self.port)]);
        }
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address for {}", self.host),
            ));
        }
        Ok(addrs)
    }

    fn open(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.resolve()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        self.close();
        self.stream = Some(self.open()?);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Peer may already be gone
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
