//! RobotStateSource trait definition

use crate::error::Result;

/// Live robot state as seen by the telemetry bridge
///
/// Both reads are fallible: the controller may invalidate its state
/// mid-motion, in which case implementations return
/// [`Error::SourceUnavailable`](crate::error::Error::SourceUnavailable).
/// On success each read returns one value per joint, in joint order.
pub trait RobotStateSource: Send {
    /// Read the current joint-position vector (rad)
    fn read_joint_positions(&mut self) -> Result<Vec<f64>>;

    /// Read the current measured joint-torque vector (Nm)
    fn read_measured_torque(&mut self) -> Result<Vec<f64>>;
}
