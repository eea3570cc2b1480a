//! Robot state sources
//!
//! The controller-side binding to real LBR hardware lives outside this
//! crate; it plugs in by implementing
//! [`RobotStateSource`](crate::core::source::RobotStateSource). The
//! simulated arm is always available.

pub mod mock;

use crate::config::Config;
use crate::core::source::RobotStateSource;

/// Create the robot state source for this configuration
pub fn create_source(config: &Config) -> Box<dyn RobotStateSource> {
    Box::new(mock::SimulatedLbr::new(
        config.robot.dof,
        config.simulation.clone(),
    ))
}
