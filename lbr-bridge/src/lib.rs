//! LBR telemetry bridge
//!
//! Streams live joint positions and measured torques of a KUKA LBR arm to a
//! remote consumer over TCP or UDP, one text line per sample:
//!
//! ```text
//! >lbr_sensordata,123456789,JointPosition:0.1,...,0.7,MeasuredTorque:1.0,...,1.6
//! ```
//!
//! The bridge connects in the background, reconnects on its own after the
//! link drops, skips ticks while the robot state is unavailable, and can be
//! closed from any thread.
//!
//! ```no_run
//! use lbr_bridge::{Bridge, Config};
//!
//! let config = Config::load("lbr-bridge.toml")?;
//! let bridge = Bridge::from_config(&config)?;
//! // ... robot application runs ...
//! bridge.close();
//! # Ok::<(), lbr_bridge::Error>(())
//! ```

pub mod bridge;
pub mod config;
pub mod connection;
pub mod core;
pub mod devices;
pub mod error;
pub mod sampler;
pub mod shutdown;
pub mod streaming;
pub mod transport;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeSettings};
pub use config::{Config, RetryPolicy};
pub use connection::ConnectionManager;
pub use crate::core::source::RobotStateSource;
pub use crate::core::types::{ConnectionState, StateSnapshot, Transition};
pub use error::{Error, Result};
pub use sampler::Sampler;
pub use shutdown::ShutdownFlag;
pub use streaming::{encode, parse_frame, Frame, FrameEncoder};
pub use transport::{create_transport, ConnectionType, Transport};
