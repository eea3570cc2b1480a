//! Sensor frame encoding, publishing and receiving

pub mod frame;
pub mod listener;
pub mod publisher;

pub use frame::{encode, parse_frame, FloatFormat, Frame, FrameEncoder};
pub use listener::{FrameListener, ListenerEvent, ListenerStats};
pub use publisher::{PublishExit, PublisherLoop, PublisherStats};
