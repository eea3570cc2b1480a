//! Cooperative shutdown flag shared between the bridge worker and its owner.
//!
//! The flag is write-once: [`ShutdownFlag::request`] sets it and it is never
//! cleared. Besides the atomic boolean it holds the only sender of a wake-up
//! channel; requesting shutdown drops that sender, which wakes every
//! [`ShutdownFlag::sleep`] in progress immediately.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Write-once cancellation token
#[derive(Clone)]
pub struct ShutdownFlag {
    inner: Arc<Inner>,
}

struct Inner {
    requested: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                wake_tx: Mutex::new(Some(wake_tx)),
                wake_rx,
            }),
        }
    }

    /// Set the flag; returns `true` only for the call that actually set it
    pub fn request(&self) -> bool {
        let first = !self.inner.requested.swap(true, Ordering::SeqCst);
        if first {
            self.inner.wake_tx.lock().take();
        }
        first
    }

    /// Whether shutdown has been requested
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless shutdown is requested first
    ///
    /// Returns `true` if the full duration elapsed without a shutdown request.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_requested() {
            return false;
        }
        match self.inner.wake_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_requested(),
            // Sender dropped by request()
            Err(RecvTimeoutError::Disconnected) | Ok(()) => false,
        }
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}
