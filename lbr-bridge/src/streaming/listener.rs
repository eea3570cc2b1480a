//! Remote-consumer side of the telemetry link
//!
//! Accepts the bridge's TCP connection (one peer at a time) or receives its
//! UDP datagrams, splits the byte stream into lines and parses each line
//! with [`parse_frame`]. Used by the `lbr-listener` binary and by the
//! loopback tests.
//!
//! Reads use a 100ms timeout so the shutdown flag is checked regularly.

use crate::core::types::StateSnapshot;
use crate::error::{Error, Result};
use crate::shutdown::ShutdownFlag;
use crate::streaming::frame::{parse_frame, RECORD_DELIMITER};
use crate::transport::ConnectionType;
use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const ACCEPT_INTERVAL: Duration = Duration::from_millis(10);
/// Largest datagram a frame can arrive in
const MAX_DATAGRAM_SIZE: usize = 65_507;
/// Longest line accepted from a stream peer; longer lines are reported and skipped
const MAX_LINE_LENGTH: usize = MAX_DATAGRAM_SIZE;
/// Bytes of an oversized line kept for the malformed report
const OVERSIZED_PREVIEW: usize = 64;

/// Something the listener observed
#[derive(Debug)]
pub enum ListenerEvent {
    /// A bridge connected (TCP only)
    PeerConnected(SocketAddr),
    /// The connected bridge went away (TCP only)
    PeerDisconnected(SocketAddr),
    /// A well-formed sensor frame
    Frame(StateSnapshot),
    /// A line that failed to parse
    Malformed { line: String, error: Error },
}

/// Totals reported when the listener stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub frames: u64,
    pub malformed: u64,
    pub peers: u64,
}

/// Bound consumer socket
pub enum FrameListener {
    Tcp(TcpListener),
    Udp(UdpSocket),
}

impl FrameListener {
    /// Bind a listener of the given kind
    pub fn bind(addr: &str, kind: ConnectionType) -> Result<Self> {
        match kind {
            ConnectionType::Tcp => {
                let listener = TcpListener::bind(addr)?;
                listener.set_nonblocking(true)?;
                Ok(FrameListener::Tcp(listener))
            }
            ConnectionType::Udp => {
                let socket = UdpSocket::bind(addr)?;
                socket.set_read_timeout(Some(POLL_INTERVAL))?;
                Ok(FrameListener::Udp(socket))
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(match self {
            FrameListener::Tcp(listener) => listener.local_addr()?,
            FrameListener::Udp(socket) => socket.local_addr()?,
        })
    }

    /// Receive until `shutdown` is requested, reporting every event
    pub fn run<F>(&self, shutdown: &ShutdownFlag, mut on_event: F) -> Result<ListenerStats>
    where
        F: FnMut(ListenerEvent),
    {
        let mut stats = ListenerStats::default();
        match self {
            FrameListener::Tcp(listener) => {
                while !shutdown.is_requested() {
                    match listener.accept() {
                        Ok((stream, addr)) => {
                            stats.peers += 1;
                            on_event(ListenerEvent::PeerConnected(addr));
                            if let Err(e) =
                                Self::serve_stream(stream, shutdown, &mut stats, &mut on_event)
                            {
                                debug!("Peer {} read error: {}", addr, e);
                            }
                            on_event(ListenerEvent::PeerDisconnected(addr));
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                            shutdown.sleep(ACCEPT_INTERVAL);
                        }
                        Err(e) => {
                            warn!("Accept error: {}", e);
                            shutdown.sleep(POLL_INTERVAL);
                        }
                    }
                }
            }
            FrameListener::Udp(socket) => {
                let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
                while !shutdown.is_requested() {
                    match socket.recv_from(&mut buf) {
                        Ok((n, _from)) => {
                            for line in buf[..n]
                                .split(|b| *b == RECORD_DELIMITER as u8)
                                .filter(|l| !l.is_empty())
                            {
                                Self::handle_line(line, &mut stats, &mut on_event);
                            }
                        }
                        Err(ref e) if is_timeout(e) => {}
                        Err(e) => {
                            // e.g. ICMP errors surfaced on some platforms
                            debug!("UDP receive error: {}", e);
                        }
                    }
                }
            }
        }
        info!(
            "Listener stopped ({} frames, {} malformed, {} peers)",
            stats.frames, stats.malformed, stats.peers
        );
        Ok(stats)
    }

    fn serve_stream<F>(
        stream: TcpStream,
        shutdown: &ShutdownFlag,
        stats: &mut ListenerStats,
        on_event: &mut F,
    ) -> io::Result<()>
    where
        F: FnMut(ListenerEvent),
    {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        let mut reader = BufReader::new(stream);
        let mut line = Vec::with_capacity(512);
        // Dropping the tail of an oversized line up to its delimiter
        let mut discarding = false;

        while !shutdown.is_requested() {
            // At least one byte: `line` never exceeds the cap between reads
            let budget = (MAX_LINE_LENGTH + 1 - line.len()) as u64;
            match reader
                .by_ref()
                .take(budget)
                .read_until(RECORD_DELIMITER as u8, &mut line)
            {
                Ok(0) => break,
                // EOF mid-line leaves `line` unterminated; next read returns 0
                Ok(_) => {}
                // Partial data stays in `line` across timeouts
                Err(ref e) if is_timeout(e) => {}
                Err(e) => return Err(e),
            }

            let complete = line.last() == Some(&(RECORD_DELIMITER as u8));
            if discarding {
                discarding = !complete;
                line.clear();
            } else if line.len() > MAX_LINE_LENGTH {
                Self::report_oversized(&line, stats, on_event);
                discarding = !complete;
                line.clear();
            } else if complete {
                Self::handle_line(&line, stats, on_event);
                line.clear();
            }
        }
        Ok(())
    }

    fn report_oversized<F>(line: &[u8], stats: &mut ListenerStats, on_event: &mut F)
    where
        F: FnMut(ListenerEvent),
    {
        stats.malformed += 1;
        let preview = &line[..line.len().min(OVERSIZED_PREVIEW)];
        on_event(ListenerEvent::Malformed {
            line: format!("{}...", String::from_utf8_lossy(preview)),
            error: Error::InvalidFrame(format!("line exceeds {} bytes", MAX_LINE_LENGTH)),
        });
    }

    fn handle_line<F>(line: &[u8], stats: &mut ListenerStats, on_event: &mut F)
    where
        F: FnMut(ListenerEvent),
    {
        let text = String::from_utf8_lossy(line);
        match parse_frame(&text) {
            Ok(snapshot) => {
                stats.frames += 1;
                on_event(ListenerEvent::Frame(snapshot));
            }
            Err(error) => {
                stats.malformed += 1;
                on_event(ListenerEvent::Malformed {
                    line: text.trim_end().to_string(),
                    error,
                });
            }
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
