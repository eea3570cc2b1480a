//! Core abstractions shared by the bridge components.
//!
//! - [`source::RobotStateSource`]: Trait to implement for a robot state binding
//! - [`types`]: Snapshots, connection states and transitions

pub mod source;
pub mod types;
