//! Robot state sampler
//!
//! Turns the two fallible reads of a [`RobotStateSource`] into at most one
//! validated [`StateSnapshot`] per tick. Nothing here ever fails the caller:
//! an unavailable source, a vector of the wrong length or a non-finite
//! reading all yield `None` and the tick is skipped.

use crate::core::source::RobotStateSource;
use crate::core::types::StateSnapshot;
use log::{debug, trace};
use std::time::Instant;

/// Log every Nth skipped sample to keep a flapping source from flooding logs
const SKIP_LOG_INTERVAL: u64 = 100;

/// Nanosecond clock anchored at creation, immune to wall-clock jumps
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Nanoseconds since the clock was created
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples joint positions and torques from a robot state source
pub struct Sampler {
    source: Box<dyn RobotStateSource>,
    dof: usize,
    clock: MonotonicClock,
    skipped: u64,
}

impl Sampler {
    /// Create a sampler expecting `dof` joints per reading
    pub fn new(source: Box<dyn RobotStateSource>, dof: usize) -> Self {
        Self {
            source,
            dof,
            clock: MonotonicClock::new(),
            skipped: 0,
        }
    }

    /// Read one snapshot, or `None` if this tick has to be skipped
    pub fn sample(&mut self) -> Option<StateSnapshot> {
        let positions = match self.source.read_joint_positions() {
            Ok(p) => p,
            Err(e) => return self.skip(format_args!("joint positions: {}", e)),
        };
        let torques = match self.source.read_measured_torque() {
            Ok(t) => t,
            Err(e) => return self.skip(format_args!("measured torque: {}", e)),
        };
        let timestamp_ns = self.clock.now_ns();

        let dof = self.dof;
        if positions.len() != dof || torques.len() != dof {
            return self.skip(format_args!(
                "expected {} joints, got {} positions and {} torques",
                dof,
                positions.len(),
                torques.len()
            ));
        }
        if positions.iter().chain(torques.iter()).any(|v| !v.is_finite()) {
            return self.skip(format_args!("non-finite joint reading"));
        }

        match StateSnapshot::new(positions, torques, timestamp_ns) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => self.skip(format_args!("{}", e)),
        }
    }

    /// Number of ticks skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn skip(&mut self, reason: std::fmt::Arguments<'_>) -> Option<StateSnapshot> {
        self.skipped += 1;
        if self.skipped % SKIP_LOG_INTERVAL == 1 {
            debug!("Sample skipped ({} total): {}", self.skipped, reason);
        } else {
            trace!("Sample skipped: {}", reason);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::collections::VecDeque;

    /// Source replaying scripted reads
    struct ScriptedSource {
        positions: VecDeque<Result<Vec<f64>>>,
        torques: VecDeque<Result<Vec<f64>>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                positions: VecDeque::new(),
                torques: VecDeque::new(),
            }
        }

        fn push(mut self, positions: Result<Vec<f64>>, torques: Result<Vec<f64>>) -> Self {
            self.positions.push_back(positions);
            self.torques.push_back(torques);
            self
        }
    }

    impl RobotStateSource for ScriptedSource {
        fn read_joint_positions(&mut self) -> Result<Vec<f64>> {
            self.positions
                .pop_front()
                .unwrap_or_else(|| Err(Error::SourceUnavailable("script exhausted".into())))
        }

        fn read_measured_torque(&mut self) -> Result<Vec<f64>> {
            self.torques
                .pop_front()
                .unwrap_or_else(|| Err(Error::SourceUnavailable("script exhausted".into())))
        }
    }

    fn unavailable() -> Result<Vec<f64>> {
        Err(Error::SourceUnavailable("state invalidated".into()))
    }

    #[test]
    fn test_valid_sample() {
        let source = ScriptedSource::new().push(Ok(vec![0.1; 7]), Ok(vec![1.0; 7]));
        let mut sampler = Sampler::new(Box::new(source), 7);

        let snap = sampler.sample().expect("valid sample");
        assert_eq!(snap.positions(), &[0.1; 7]);
        assert_eq!(snap.torques(), &[1.0; 7]);
        assert_eq!(sampler.skipped(), 0);
    }

    #[test]
    fn test_source_failure_is_absorbed() {
        let source = ScriptedSource::new()
            .push(unavailable(), Ok(vec![1.0; 7]))
            .push(Ok(vec![0.1; 7]), unavailable())
            .push(Ok(vec![0.2; 7]), Ok(vec![2.0; 7]));
        let mut sampler = Sampler::new(Box::new(source), 7);

        assert!(sampler.sample().is_none());
        // First torque read was never consumed by the failed tick
        assert!(sampler.sample().is_some());
        assert!(sampler.sample().is_none());
        assert_eq!(sampler.skipped(), 2);
    }

    #[test]
    fn test_mismatched_lengths_are_discarded() {
        let source = ScriptedSource::new()
            .push(Ok(vec![0.1; 7]), Ok(vec![1.0; 6]))
            .push(Ok(vec![0.1; 6]), Ok(vec![1.0; 6]));
        let mut sampler = Sampler::new(Box::new(source), 7);

        assert!(sampler.sample().is_none());
        assert!(sampler.sample().is_none());
        assert_eq!(sampler.skipped(), 2);
    }

    #[test]
    fn test_non_finite_values_are_discarded() {
        let mut torques = vec![1.0; 7];
        torques[3] = f64::NAN;
        let source = ScriptedSource::new().push(Ok(vec![0.1; 7]), Ok(torques));
        let mut sampler = Sampler::new(Box::new(source), 7);
        assert!(sampler.sample().is_none());
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let mut source = ScriptedSource::new();
        for _ in 0..10 {
            source = source.push(Ok(vec![0.0; 7]), Ok(vec![0.0; 7]));
        }
        let mut sampler = Sampler::new(Box::new(source), 7);

        let stamps: Vec<u64> = (0..10)
            .filter_map(|_| sampler.sample())
            .map(|s| s.timestamp_ns())
            .collect();
        assert_eq!(stamps.len(), 10);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
