//! Bridge lifecycle scenarios against the mock transport
//!
//! The state source numbers its samples (joint positions carry the tick
//! number) and can request shutdown after a given tick, so every scenario
//! ends deterministically regardless of scheduling.
//!
//! Run with: `cargo test --test bridge_scenarios`

use lbr_bridge::transport::mock::MockTransport;
use lbr_bridge::{
    parse_frame, Bridge, BridgeSettings, ConnectionState, Error, Result, RetryPolicy,
    RobotStateSource, ShutdownFlag, Transition,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Test Fixtures
// ============================================================================

const DOF: usize = 7;
const FINISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source numbering its samples 1, 2, 3, ...
struct TickSource {
    tick: u64,
    /// Request shutdown while producing this tick (0 = never)
    stop_after: u64,
    /// Ticks on which the robot state is unavailable
    missing: Vec<u64>,
    shutdown: ShutdownFlag,
}

impl TickSource {
    fn new(stop_after: u64, shutdown: &ShutdownFlag) -> Self {
        Self {
            tick: 0,
            stop_after,
            missing: Vec::new(),
            shutdown: shutdown.clone(),
        }
    }

    fn with_missing(mut self, ticks: &[u64]) -> Self {
        self.missing = ticks.to_vec();
        self
    }
}

impl RobotStateSource for TickSource {
    fn read_joint_positions(&mut self) -> Result<Vec<f64>> {
        self.tick += 1;
        if self.tick == self.stop_after {
            self.shutdown.request();
        }
        if self.missing.contains(&self.tick) {
            return Err(Error::SourceUnavailable("state invalidated".into()));
        }
        Ok(vec![self.tick as f64; DOF])
    }

    fn read_measured_torque(&mut self) -> Result<Vec<f64>> {
        Ok(vec![self.tick as f64 + 0.5; DOF])
    }
}

fn fast_settings() -> BridgeSettings {
    BridgeSettings {
        tick_period: Duration::from_millis(1),
        retry: RetryPolicy::fixed(Duration::from_millis(5)),
        ..BridgeSettings::default()
    }
}

fn start(mock: &MockTransport, source: TickSource, shutdown: ShutdownFlag) -> Bridge {
    Bridge::spawn_with_shutdown(
        Box::new(mock.clone()),
        Box::new(source),
        fast_settings(),
        shutdown,
    )
    .unwrap()
}

/// Tick numbers of the frames the mock received, asserting each parses
fn received_ticks(mock: &MockTransport) -> Vec<u64> {
    mock.written_lines()
        .iter()
        .map(|line| {
            let snap = parse_frame(line).expect("well-formed frame");
            assert_eq!(snap.dof(), DOF);
            assert_eq!(snap.torques()[0], snap.positions()[0] + 0.5);
            snap.positions()[0] as u64
        })
        .collect()
}

fn received_timestamps(mock: &MockTransport) -> Vec<u64> {
    mock.written_lines()
        .iter()
        .map(|line| parse_frame(line).unwrap().timestamp_ns())
        .collect()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn transitions(bridge: &Bridge) -> Vec<(ConnectionState, ConnectionState)> {
    bridge
        .take_transitions()
        .expect("transitions not taken yet")
        .try_iter()
        .map(|Transition { from, to }| (from, to))
        .collect()
}

// ============================================================================
// Streaming Scenarios
// ============================================================================

#[test]
fn test_happy_path_sends_one_frame_per_tick() {
    let mock = MockTransport::new();
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(10, &shutdown), shutdown);

    assert!(bridge.wait_finished(FINISH_TIMEOUT));
    bridge.close();

    assert_eq!(received_ticks(&mock), (1..=10).collect::<Vec<_>>());
    let stamps = received_timestamps(&mock);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "timestamps out of order");
    assert_eq!(mock.connect_calls(), 1);
    assert!(!mock.is_open());
}

#[test]
fn test_transient_sample_gap_skips_only_that_tick() {
    let mock = MockTransport::new();
    let shutdown = ShutdownFlag::new();
    let source = TickSource::new(5, &shutdown).with_missing(&[3]);
    let bridge = start(&mock, source, shutdown);

    assert!(bridge.wait_finished(FINISH_TIMEOUT));
    bridge.close();

    assert_eq!(received_ticks(&mock), vec![1, 2, 4, 5]);
    // A missed sample never drops the connection
    assert_eq!(mock.connect_calls(), 1);
}

#[test]
fn test_write_failure_reconnects_and_resumes() {
    let mock = MockTransport::new();
    mock.fail_send_at(2);
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(6, &shutdown), shutdown);

    assert!(bridge.wait_finished(FINISH_TIMEOUT));
    bridge.close();

    // Only the frame of the failed write is lost
    assert_eq!(received_ticks(&mock), vec![1, 3, 4, 5, 6]);
    assert_eq!(mock.connect_calls(), 2);

    use ConnectionState::*;
    assert_eq!(
        transitions(&bridge),
        vec![
            (Disconnected, Connecting),
            (Connecting, Connected),
            (Connected, Disconnected),
            (Disconnected, Connecting),
            (Connecting, Connected),
            (Connected, Closed),
        ]
    );
}

#[test]
fn test_unreachable_consumer_is_retried_until_available() {
    let mock = MockTransport::new();
    mock.fail_next_connects(3);
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(3, &shutdown), shutdown);

    assert!(bridge.wait_finished(FINISH_TIMEOUT));
    bridge.close();

    assert_eq!(mock.connect_calls(), 4);
    assert_eq!(received_ticks(&mock), vec![1, 2, 3]);
}

#[test]
fn test_already_connected_transport_streams_immediately() {
    let mock = MockTransport::connected();
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(3, &shutdown), shutdown);

    assert!(bridge.wait_finished(FINISH_TIMEOUT));
    bridge.close();

    assert_eq!(mock.connect_calls(), 0);
    assert_eq!(received_ticks(&mock), vec![1, 2, 3]);
}

#[test]
fn test_links_failing_on_first_write_reconnect_at_retry_rate() {
    let mock = MockTransport::new();
    for call in 1..=1000 {
        mock.fail_send_at(call);
    }
    let shutdown = ShutdownFlag::new();
    let settings = BridgeSettings {
        retry: RetryPolicy::fixed(Duration::from_millis(100)),
        ..fast_settings()
    };
    let bridge = Bridge::spawn_with_shutdown(
        Box::new(mock.clone()),
        Box::new(TickSource::new(0, &shutdown)),
        settings,
        shutdown,
    )
    .unwrap();

    thread::sleep(Duration::from_millis(350));
    bridge.close();

    // One attempt up front, then one per retry interval; a 1ms tick would
    // otherwise reconnect hundreds of times
    let connects = mock.connect_calls();
    assert!((2..=5).contains(&connects), "{} connects in 350ms", connects);
    assert!(mock.send_calls() <= connects);
    assert!(mock.written().is_empty());
}

// ============================================================================
// Shutdown Scenarios
// ============================================================================

#[test]
fn test_construction_does_not_block_on_connect() {
    let mock = MockTransport::new();
    mock.set_connect_delay(Duration::from_millis(500));
    let shutdown = ShutdownFlag::new();

    let started = Instant::now();
    let bridge = start(&mock, TickSource::new(0, &shutdown), shutdown);
    assert!(started.elapsed() < Duration::from_millis(400));

    bridge.close();
    assert!(!mock.is_open());
}

#[test]
fn test_no_socket_activity_after_close() {
    let mock = MockTransport::new();
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(0, &shutdown), shutdown);

    assert!(wait_until(FINISH_TIMEOUT, || mock.send_calls() >= 5));
    bridge.close();

    let connects = mock.connect_calls();
    let sends = mock.send_calls();
    assert!(!mock.is_open());

    thread::sleep(Duration::from_millis(50));
    assert_eq!(mock.connect_calls(), connects);
    assert_eq!(mock.send_calls(), sends);
    assert!(bridge.is_closed());
}

#[test]
fn test_close_is_idempotent() {
    let mock = MockTransport::new();
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(0, &shutdown), shutdown);
    assert!(wait_until(FINISH_TIMEOUT, || mock.send_calls() >= 1));

    for _ in 0..5 {
        bridge.close();
    }

    assert!(!mock.is_open());
    let to_closed = transitions(&bridge)
        .into_iter()
        .filter(|(_, to)| *to == ConnectionState::Closed)
        .count();
    assert_eq!(to_closed, 1);
}

#[test]
fn test_concurrent_close_calls_all_wait_for_release() {
    let mock = MockTransport::new();
    let shutdown = ShutdownFlag::new();
    let bridge = Arc::new(start(&mock, TickSource::new(0, &shutdown), shutdown));
    assert!(wait_until(FINISH_TIMEOUT, || mock.send_calls() >= 1));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bridge = Arc::clone(&bridge);
            let mock = mock.clone();
            thread::spawn(move || {
                bridge.close();
                // Every caller observes the released transport on return
                assert!(!mock.is_open());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(bridge.is_closed());
}

#[test]
fn test_close_during_inflight_connect_releases_socket() {
    let mock = MockTransport::new();
    mock.set_connect_delay(Duration::from_millis(300));
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(0, &shutdown), shutdown);

    assert!(wait_until(FINISH_TIMEOUT, || mock.connect_calls() >= 1));
    bridge.close();

    assert!(!mock.is_open());
    assert_eq!(mock.connect_calls(), 1);
    assert_eq!(mock.send_calls(), 0);

    use ConnectionState::*;
    assert_eq!(
        transitions(&bridge),
        vec![(Disconnected, Connecting), (Connecting, Closed)]
    );
}

#[test]
fn test_close_during_retry_stops_attempts() {
    let mock = MockTransport::new();
    mock.set_refuse_connects(true);
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(0, &shutdown), shutdown);

    assert!(wait_until(FINISH_TIMEOUT, || mock.connect_calls() >= 3));
    bridge.close();
    let attempts = mock.connect_calls();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(mock.connect_calls(), attempts);
    assert_eq!(mock.send_calls(), 0);
}

#[test]
fn test_close_interrupts_long_retry_delay() {
    let mock = MockTransport::new();
    mock.set_refuse_connects(true);
    let shutdown = ShutdownFlag::new();
    let settings = BridgeSettings {
        retry: RetryPolicy::fixed(Duration::from_secs(60)),
        ..fast_settings()
    };
    let bridge = Bridge::spawn_with_shutdown(
        Box::new(mock.clone()),
        Box::new(TickSource::new(0, &shutdown)),
        settings,
        shutdown,
    )
    .unwrap();

    assert!(wait_until(FINISH_TIMEOUT, || mock.connect_calls() >= 1));
    let started = Instant::now();
    bridge.close();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(mock.connect_calls(), 1);
}

#[test]
fn test_drop_closes_bridge() {
    let mock = MockTransport::new();
    let shutdown = ShutdownFlag::new();
    let bridge = start(&mock, TickSource::new(0, &shutdown), shutdown.clone());
    assert!(wait_until(FINISH_TIMEOUT, || mock.send_calls() >= 1));

    drop(bridge);
    assert!(shutdown.is_requested());
    assert!(!mock.is_open());
}
