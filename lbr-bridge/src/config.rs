//! Configuration for the LBR telemetry bridge
//!
//! Loads configuration from a TOML file. Every field has a default matching
//! the KUKA Sunrise deployment, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! [network]
//! host = "127.0.0.1"
//! port = 30007
//! connection_type = "tcp"   # or "udp"
//!
//! [publisher]
//! tick_period_ms = 30
//!
//! [retry]
//! policy = "fixed"
//! interval_ms = 3000
//!
//! [robot]
//! dof = 7
//! ```

use crate::error::{Error, Result};
use crate::transport::ConnectionType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote consumer endpoint and transport
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Remote consumer host name or IP address
    #[serde(default = "default_host")]
    pub host: String,

    /// Remote consumer port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Stream (`tcp`) or datagram (`udp`) transport
    #[serde(default)]
    pub connection_type: ConnectionType,

    /// Upper bound for a single connection attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound for writing a single frame
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    30007
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
fn default_write_timeout_ms() -> u64 {
    500
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connection_type: ConnectionType::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    /// Endpoint as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Publisher loop timing and frame formatting
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    /// Tick period between samples
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Fixed number of decimals for frame values (at least 1)
    ///
    /// When unset, values use the shortest representation that parses back
    /// to the same number (always with a fractional part).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_decimals: Option<u8>,
}

fn default_tick_period_ms() -> u64 {
    30
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            float_decimals: None,
        }
    }
}

impl PublisherConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

/// Delay policy between connection attempts
///
/// There is no attempt limit: the bridge retries until it connects or is
/// closed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Same delay after every failed attempt
    Fixed {
        #[serde(default = "default_retry_interval_ms")]
        interval_ms: u64,
    },
    /// Delay grows by `multiplier` per consecutive failure, capped at `max_ms`
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
}

fn default_retry_interval_ms() -> u64 {
    3000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            interval_ms: default_retry_interval_ms(),
        }
    }
}

impl RetryPolicy {
    /// Fixed policy with the given interval
    pub fn fixed(interval: Duration) -> Self {
        RetryPolicy::Fixed {
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Delay to wait after `consecutive_failures` failed attempts (1-based)
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        match *self {
            RetryPolicy::Fixed { interval_ms } => Duration::from_millis(interval_ms),
            RetryPolicy::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => {
                let exponent = consecutive_failures.saturating_sub(1).min(63) as i32;
                let scaled = initial_ms as f64 * multiplier.powi(exponent);
                Duration::from_millis(scaled.min(max_ms as f64) as u64)
            }
        }
    }
}

/// Robot description
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotConfig {
    /// Degrees of freedom; every sample must have exactly this many joints
    #[serde(default = "default_dof")]
    pub dof: usize,
}

fn default_dof() -> usize {
    7
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self { dof: default_dof() }
    }
}

/// Parameters of the simulated LBR state source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// RNG seed (0 = random each run)
    #[serde(default)]
    pub random_seed: u64,

    /// Probability that a single read reports the state as unavailable
    #[serde(default)]
    pub dropout_probability: f32,

    /// Joint motion amplitude (rad)
    #[serde(default = "default_amplitude")]
    pub amplitude_rad: f64,

    /// Joint motion frequency (Hz)
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,

    /// Measured torque noise standard deviation (Nm)
    #[serde(default = "default_torque_noise")]
    pub torque_noise_stddev: f32,
}

fn default_amplitude() -> f64 {
    0.5
}
fn default_frequency() -> f64 {
    0.1
}
fn default_torque_noise() -> f32 {
    0.05
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            dropout_probability: 0.0,
            amplitude_rad: default_amplitude(),
            frequency_hz: default_frequency(),
            torque_noise_stddev: default_torque_noise(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.network.host.is_empty() {
            return Err(Error::InvalidParameter("network.host is empty".into()));
        }
        if self.network.port == 0 {
            return Err(Error::InvalidParameter("network.port must be non-zero".into()));
        }
        if self.network.connect_timeout_ms == 0 || self.network.write_timeout_ms == 0 {
            // std rejects zero socket timeouts
            return Err(Error::InvalidParameter(
                "network timeouts must be non-zero".into(),
            ));
        }
        if self.publisher.tick_period_ms == 0 {
            return Err(Error::InvalidParameter(
                "publisher.tick_period_ms must be non-zero".into(),
            ));
        }
        if self.publisher.float_decimals == Some(0) {
            return Err(Error::InvalidParameter(
                "publisher.float_decimals must be at least 1".into(),
            ));
        }
        if self.robot.dof == 0 {
            return Err(Error::InvalidParameter("robot.dof must be non-zero".into()));
        }
        match self.retry {
            RetryPolicy::Fixed { interval_ms } if interval_ms == 0 => Err(
                Error::InvalidParameter("retry.interval_ms must be non-zero".into()),
            ),
            RetryPolicy::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } if initial_ms == 0 || max_ms < initial_ms || multiplier < 1.0 => {
                Err(Error::InvalidParameter(format!(
                    "invalid exponential retry: initial={}ms max={}ms multiplier={}",
                    initial_ms, max_ms, multiplier
                )))
            }
            _ => Ok(()),
        }?;
        if !(0.0..=1.0).contains(&self.simulation.dropout_probability) {
            return Err(Error::InvalidParameter(
                "simulation.dropout_probability must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
