//! Mock transport for testing
//!
//! Clones share state, so a test keeps one handle while the bridge owns the
//! other, then inspects what was connected and written.

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Scriptable in-memory transport
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    open: bool,
    connect_calls: u64,
    send_calls: u64,
    close_calls: u64,
    /// Outcomes for upcoming connects; empty means success
    connect_plan: VecDeque<bool>,
    /// When set, every connect fails
    refuse_connects: bool,
    connect_delay: Duration,
    /// 1-based send call numbers that fail
    failing_sends: HashSet<u64>,
    written: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a mock transport that connects successfully
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner::default())),
        }
    }

    /// Create a mock transport that already holds an open link
    pub fn connected() -> Self {
        let mock = Self::new();
        mock.inner.lock().open = true;
        mock
    }

    /// Fail the next `count` connection attempts
    pub fn fail_next_connects(&self, count: usize) {
        let mut inner = self.inner.lock();
        inner.connect_plan.extend(std::iter::repeat(false).take(count));
    }

    /// Fail (or stop failing) every connection attempt
    pub fn set_refuse_connects(&self, refuse: bool) {
        self.inner.lock().refuse_connects = refuse;
    }

    /// Block each connection attempt for `delay`
    pub fn set_connect_delay(&self, delay: Duration) {
        self.inner.lock().connect_delay = delay;
    }

    /// Fail the `call`-th send (1-based) with a broken pipe
    pub fn fail_send_at(&self, call: u64) {
        self.inner.lock().failing_sends.insert(call);
    }

    /// Whether the link is currently open
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    pub fn connect_calls(&self) -> u64 {
        self.inner.lock().connect_calls
    }

    pub fn send_calls(&self) -> u64 {
        self.inner.lock().send_calls
    }

    pub fn close_calls(&self) -> u64 {
        self.inner.lock().close_calls
    }

    /// Successfully written payloads, in write order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.inner.lock().written.clone()
    }

    /// Successfully written payloads decoded as UTF-8 lines
    pub fn written_lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .written
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<()> {
        let delay = {
            let mut inner = self.inner.lock();
            inner.connect_calls += 1;
            inner.open = false;
            inner.connect_delay
        };

        // Lock released so tests can observe the in-flight attempt
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut inner = self.inner.lock();
        let planned = inner.connect_plan.pop_front().unwrap_or(true);
        if inner.refuse_connects || !planned {
            return Err(Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)));
        }
        inner.open = true;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(Error::NotConnected);
        }
        inner.send_calls += 1;
        let call = inner.send_calls;
        if inner.failing_sends.contains(&call) {
            return Err(Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        inner.written.push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        inner.close_calls += 1;
        inner.open = false;
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().open
    }

    fn describe(&self) -> String {
        "mock://".to_string()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
