//! Line-oriented sensor frame format
//!
//! # Wire Format
//!
//! One frame per line, comma-separated, fixed field order:
//!
//! ```text
//! >lbr_sensordata,<timestamp_ns>,JointPosition:<p1>,...,<pN>,MeasuredTorque:<t1>,...,<tN>\n
//! ```
//!
//! Example (N = 7):
//!
//! ```text
//! >lbr_sensordata,123456789,JointPosition:0.1,0.2,0.3,0.4,0.5,0.6,0.7,MeasuredTorque:1.0,1.1,1.2,1.3,1.4,1.5,1.6
//! ```
//!
//! Numeric fields never contain `,` so no escaping is needed. Values are
//! always written in plain decimal notation with a fractional part, so the
//! stream stays greppable and diffs cleanly between frames.

use crate::core::types::StateSnapshot;
use crate::error::{Error, Result};
use std::fmt::Write;

/// Message tag opening every sensor frame
pub const FRAME_TAG: &str = ">lbr_sensordata";
/// Marker preceding the first joint position
pub const POSITION_MARKER: &str = "JointPosition:";
/// Marker preceding the first measured torque
pub const TORQUE_MARKER: &str = "MeasuredTorque:";
/// Field separator
pub const FIELD_DELIMITER: char = ',';
/// Record terminator
pub const RECORD_DELIMITER: char = '\n';

/// One encoded, newline-terminated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    line: String,
}

impl Frame {
    /// Full line including the record terminator
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.line
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }
}

/// Decimal representation used for frame values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatFormat {
    /// Shortest representation that parses back to the same value
    #[default]
    Shortest,
    /// Fixed number of decimals; zero is written as one
    Fixed(u8),
}

impl FloatFormat {
    /// `Fixed(n)` when a decimal count is configured, `Shortest` otherwise
    pub fn from_decimals(decimals: Option<u8>) -> Self {
        decimals.map_or(FloatFormat::Shortest, FloatFormat::Fixed)
    }

    fn write_value(self, out: &mut String, value: f64) {
        match self {
            FloatFormat::Shortest => {
                let start = out.len();
                let _ = write!(out, "{}", value);
                // Display drops the fractional part of integral values
                if value.is_finite() && !out[start..].contains('.') {
                    out.push_str(".0");
                }
            }
            FloatFormat::Fixed(decimals) => {
                let _ = write!(out, "{:.*}", decimals.max(1) as usize, value);
            }
        }
    }
}

/// Stateless snapshot-to-frame encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    format: FloatFormat,
}

impl FrameEncoder {
    pub fn new(format: FloatFormat) -> Self {
        Self { format }
    }

    /// Encode one snapshot; deterministic for a given snapshot and format
    pub fn encode(&self, snapshot: &StateSnapshot) -> Frame {
        // ~12 bytes per value is enough for typical joint data
        let mut line = String::with_capacity(48 + snapshot.dof() * 2 * 12);

        line.push_str(FRAME_TAG);
        line.push(FIELD_DELIMITER);
        let _ = write!(line, "{}", snapshot.timestamp_ns());

        line.push(FIELD_DELIMITER);
        line.push_str(POSITION_MARKER);
        self.write_values(&mut line, snapshot.positions());

        line.push(FIELD_DELIMITER);
        line.push_str(TORQUE_MARKER);
        self.write_values(&mut line, snapshot.torques());

        line.push(RECORD_DELIMITER);
        Frame { line }
    }

    fn write_values(&self, line: &mut String, values: &[f64]) {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            self.format.write_value(line, *value);
        }
    }
}

/// Encode with the default (shortest) float format
pub fn encode(snapshot: &StateSnapshot) -> Frame {
    FrameEncoder::default().encode(snapshot)
}

#[derive(PartialEq)]
enum Section {
    Header,
    Positions,
    Torques,
}

/// Parse one frame line back into a snapshot
///
/// Accepts the line with or without its terminator (`\n` or `\r\n`).
pub fn parse_frame(line: &str) -> Result<StateSnapshot> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut fields = line.split(FIELD_DELIMITER);

    match fields.next() {
        Some(FRAME_TAG) => {}
        other => {
            return Err(Error::InvalidFrame(format!(
                "expected tag {}, got {:?}",
                FRAME_TAG,
                other.unwrap_or("")
            )))
        }
    }

    let timestamp_ns = fields
        .next()
        .ok_or_else(|| Error::InvalidFrame("missing timestamp".into()))?
        .parse::<u64>()
        .map_err(|e| Error::InvalidFrame(format!("bad timestamp: {}", e)))?;

    let mut positions = Vec::new();
    let mut torques = Vec::new();
    let mut section = Section::Header;

    for field in fields {
        let value = if let Some(rest) = field.strip_prefix(POSITION_MARKER) {
            if section != Section::Header {
                return Err(Error::InvalidFrame("unexpected JointPosition marker".into()));
            }
            section = Section::Positions;
            rest
        } else if let Some(rest) = field.strip_prefix(TORQUE_MARKER) {
            if section != Section::Positions {
                return Err(Error::InvalidFrame("unexpected MeasuredTorque marker".into()));
            }
            section = Section::Torques;
            rest
        } else {
            field
        };

        // Markers directly followed by the next marker carry no value (N = 0)
        if value.is_empty() && value.len() != field.len() {
            continue;
        }

        let parsed = value
            .parse::<f64>()
            .map_err(|e| Error::InvalidFrame(format!("bad value {:?}: {}", value, e)))?;
        match section {
            Section::Header => {
                return Err(Error::InvalidFrame(format!(
                    "value {:?} before JointPosition marker",
                    value
                )))
            }
            Section::Positions => positions.push(parsed),
            Section::Torques => torques.push(parsed),
        }
    }

    if section != Section::Torques {
        return Err(Error::InvalidFrame("missing MeasuredTorque section".into()));
    }

    StateSnapshot::new(positions, torques, timestamp_ns)
        .map_err(|e| Error::InvalidFrame(e.to_string()))
}
