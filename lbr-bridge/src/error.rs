//! Error types for the LBR telemetry bridge

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
///
/// Inside the running bridge these are turned into return values and log
/// lines; they only propagate to callers at the edges (configuration,
/// thread spawn, frame parsing).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation requires an established transport
    #[error("Transport not connected")]
    NotConnected,

    /// Robot state temporarily unavailable
    #[error("Robot state unavailable: {0}")]
    SourceUnavailable(String),

    /// Received line is not a valid sensor frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
