//! Fixed-period sensor frame publisher
//!
//! Runs while the connection manager reports `Connected`. One tick:
//!
//! ```text
//! 1. Check shutdown flag
//! 2. Sample robot state (skip tick on None)
//! 3. Encode and write one frame (return TransportLost on failure)
//! 4. Check shutdown flag
//! 5. Sleep for the remainder of the tick period
//! ```
//!
//! Frames are written in sample order, one write per frame, never batched.
//! A frame whose write fails is dropped, not retried.

use crate::connection::ConnectionManager;
use crate::sampler::Sampler;
use crate::shutdown::ShutdownFlag;
use crate::streaming::frame::FrameEncoder;
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Log a progress line every N frames
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Why the publisher loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishExit {
    /// Shutdown was requested
    Shutdown,
    /// The link failed or was already down; supervision must take over
    TransportLost,
}

/// Counters accumulated over the publisher's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub frames_sent: u64,
    pub ticks_skipped: u64,
    pub write_failures: u64,
}

/// Samples, encodes and writes frames at a fixed period
pub struct PublisherLoop {
    sampler: Sampler,
    encoder: FrameEncoder,
    period: Duration,
    shutdown: ShutdownFlag,
    stats: PublisherStats,
}

impl PublisherLoop {
    pub fn new(
        sampler: Sampler,
        encoder: FrameEncoder,
        period: Duration,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            sampler,
            encoder,
            period,
            shutdown,
            stats: PublisherStats::default(),
        }
    }

    /// Stream frames over `conn` until shutdown or transport failure
    pub fn run(&mut self, conn: &mut ConnectionManager) -> PublishExit {
        debug!("Streaming sensor data every {:?}", self.period);

        while conn.is_connected() {
            if self.shutdown.is_requested() {
                return PublishExit::Shutdown;
            }
            let tick_start = Instant::now();

            match self.sampler.sample() {
                Some(snapshot) => {
                    let frame = self.encoder.encode(&snapshot);
                    if let Err(e) = conn.send(&frame) {
                        self.stats.write_failures += 1;
                        if conn.consecutive_failures() <= 1 {
                            warn!("Could not send sensor frame, connection lost: {}", e);
                        } else {
                            debug!(
                                "Could not send sensor frame ({} consecutive failures): {}",
                                conn.consecutive_failures(),
                                e
                            );
                        }
                        return PublishExit::TransportLost;
                    }
                    self.stats.frames_sent += 1;
                    if self.stats.frames_sent % PROGRESS_LOG_INTERVAL == 0 {
                        debug!(
                            "Published {} frames ({} ticks skipped)",
                            self.stats.frames_sent, self.stats.ticks_skipped
                        );
                    }
                }
                None => self.stats.ticks_skipped += 1,
            }

            if self.shutdown.is_requested() {
                return PublishExit::Shutdown;
            }
            let remaining = self.period.saturating_sub(tick_start.elapsed());
            if !self.shutdown.sleep(remaining) {
                return PublishExit::Shutdown;
            }
        }

        PublishExit::TransportLost
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::core::source::RobotStateSource;
    use crate::error::{Error, Result};
    use crate::streaming::frame::parse_frame;
    use crate::transport::mock::MockTransport;

    /// Source producing `limit` samples, then requesting shutdown
    struct CountingSource {
        reads: u64,
        limit: u64,
        missing: Vec<u64>,
        shutdown: ShutdownFlag,
    }

    impl RobotStateSource for CountingSource {
        fn read_joint_positions(&mut self) -> Result<Vec<f64>> {
            self.reads += 1;
            if self.reads == self.limit {
                self.shutdown.request();
            }
            if self.missing.contains(&self.reads) {
                return Err(Error::SourceUnavailable("mid-motion".into()));
            }
            Ok(vec![self.reads as f64; 7])
        }

        fn read_measured_torque(&mut self) -> Result<Vec<f64>> {
            Ok(vec![self.reads as f64 * 10.0; 7])
        }
    }

    fn setup(limit: u64, missing: Vec<u64>) -> (PublisherLoop, ConnectionManager, MockTransport) {
        let shutdown = ShutdownFlag::new();
        let source = CountingSource {
            reads: 0,
            limit,
            missing,
            shutdown: shutdown.clone(),
        };
        let publisher = PublisherLoop::new(
            Sampler::new(Box::new(source), 7),
            FrameEncoder::default(),
            Duration::from_millis(1),
            shutdown.clone(),
        );
        let mock = MockTransport::new();
        let mut conn = ConnectionManager::new(
            Box::new(mock.clone()),
            RetryPolicy::fixed(Duration::from_millis(1)),
            shutdown,
        );
        conn.connect();
        (publisher, conn, mock)
    }

    fn sent_ticks(mock: &MockTransport) -> Vec<f64> {
        mock.written_lines()
            .iter()
            .map(|line| parse_frame(line).unwrap().positions()[0])
            .collect()
    }

    #[test]
    fn test_publishes_one_frame_per_tick() {
        let (mut publisher, mut conn, mock) = setup(5, vec![]);
        assert_eq!(publisher.run(&mut conn), PublishExit::Shutdown);
        assert_eq!(sent_ticks(&mock), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(publisher.stats().frames_sent, 5);
    }

    #[test]
    fn test_missing_sample_skips_tick() {
        let (mut publisher, mut conn, mock) = setup(5, vec![3]);
        assert_eq!(publisher.run(&mut conn), PublishExit::Shutdown);
        assert_eq!(sent_ticks(&mock), vec![1.0, 2.0, 4.0, 5.0]);
        assert_eq!(publisher.stats().ticks_skipped, 1);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_write_failure_returns_transport_lost() {
        let (mut publisher, mut conn, mock) = setup(100, vec![]);
        mock.fail_send_at(2);
        assert_eq!(publisher.run(&mut conn), PublishExit::TransportLost);
        assert_eq!(sent_ticks(&mock), vec![1.0]);
        assert!(!mock.is_open());
        assert_eq!(publisher.stats().write_failures, 1);
    }

    #[test]
    fn test_not_connected_returns_immediately() {
        let (mut publisher, mut conn, mock) = setup(100, vec![]);
        conn.mark_disconnected();
        assert_eq!(publisher.run(&mut conn), PublishExit::TransportLost);
        assert_eq!(mock.send_calls(), 0);
    }

    #[test]
    fn test_shutdown_before_start_sends_nothing() {
        let (mut publisher, mut conn, mock) = setup(100, vec![]);
        publisher.shutdown.request();
        assert_eq!(publisher.run(&mut conn), PublishExit::Shutdown);
        assert_eq!(mock.send_calls(), 0);
    }
}
