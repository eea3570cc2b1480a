//! Simulated LBR arm for hardware-free operation
//!
//! Stands in for the controller's live state when the bridge runs off-robot
//! (development machines, CI, consumer-side integration testing).
//!
//! # Model
//!
//! | Quantity | Model |
//! |----------|-------|
//! | Joint position | `A * sin(2π f t + φ_i)`, one phase offset per joint |
//! | Measured torque | `g_i * cos(q_i)` gravity load + Gaussian noise |
//! | Availability | each read fails with `dropout_probability` |
//!
//! Failed reads return [`Error::SourceUnavailable`], mirroring the
//! controller invalidating its state mid-motion.

mod noise;

use crate::config::SimulationConfig;
use crate::core::source::RobotStateSource;
use crate::error::{Error, Result};
use noise::NoiseGenerator;
use std::f64::consts::PI;
use std::time::Instant;

/// Static gravity load per joint at zero position (Nm), LBR iiwa 7-like
const GRAVITY_LOAD: [f64; 7] = [0.0, 28.0, 0.5, -11.0, 0.3, 1.8, 0.05];

/// Simulated N-DoF arm
pub struct SimulatedLbr {
    dof: usize,
    config: SimulationConfig,
    noise: NoiseGenerator,
    start: Instant,
    last_positions: Vec<f64>,
}

impl SimulatedLbr {
    pub fn new(dof: usize, config: SimulationConfig) -> Self {
        log::info!(
            "Simulated LBR: {} joints, amplitude {:.2} rad @ {:.2} Hz, dropout {:.1}%",
            dof,
            config.amplitude_rad,
            config.frequency_hz,
            config.dropout_probability * 100.0
        );
        Self {
            dof,
            noise: NoiseGenerator::new(config.random_seed),
            config,
            start: Instant::now(),
            last_positions: vec![0.0; dof],
        }
    }

    fn check_available(&mut self) -> Result<()> {
        if self.noise.chance(self.config.dropout_probability as f64) {
            return Err(Error::SourceUnavailable("simulated state invalidation".into()));
        }
        Ok(())
    }

    fn gravity_load(joint: usize) -> f64 {
        GRAVITY_LOAD.get(joint).copied().unwrap_or(0.0)
    }
}

impl RobotStateSource for SimulatedLbr {
    fn read_joint_positions(&mut self) -> Result<Vec<f64>> {
        self.check_available()?;
        let t = self.start.elapsed().as_secs_f64();
        let omega = 2.0 * PI * self.config.frequency_hz;
        let positions: Vec<f64> = (0..self.dof)
            .map(|i| {
                let phase = i as f64 * PI / self.dof as f64;
                self.config.amplitude_rad * (omega * t + phase).sin()
            })
            .collect();
        self.last_positions.clone_from(&positions);
        Ok(positions)
    }

    fn read_measured_torque(&mut self) -> Result<Vec<f64>> {
        self.check_available()?;
        let stddev = self.config.torque_noise_stddev as f64;
        let torques = (0..self.dof)
            .map(|i| Self::gravity_load(i) * self.last_positions[i].cos() + self.noise.gaussian(stddev))
            .collect();
        Ok(torques)
    }
}
