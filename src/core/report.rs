//! Report payload sent to the Modeler.
//!
//! Ten fields separated by `;`, no terminator:
//!
//! ```text
//! px;py;pz;ox;oy;oz;points;overall_ms;signal_ms;tracking_ms
//! ```
//!
//! Durations are milliseconds with three decimals. Orientation uses the
//! shortest representation that parses back to the same `f32`.

use std::time::Duration;

use super::Pose;
use crate::error::{BridgeError, Result};

pub const FIELD_SEPARATOR: char = ';';
pub const FIELD_COUNT: usize = 10;

/// Timings and the iteration counter carried between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceReport {
    /// Wall time of the last completed iteration
    pub overall: Duration,

    /// Signal channel wait plus transfer time
    pub signal: Duration,

    /// Time spent inside the tracking stage
    pub tracking: Duration,

    /// Loop iterations so far, failed cycles included
    pub frame_count: u64,
}

/// One serialized report. Not `Clone`: each cycle builds its own and hands it
/// to the sender by value.
#[derive(Debug, PartialEq, Eq)]
pub struct ReportPayload {
    text: String,
}

impl ReportPayload {
    pub fn build(pose: &Pose, point_count: u32, performance: &PerformanceReport) -> Self {
        let [px, py, pz] = pose.position;
        let [ox, oy, oz] = pose.orientation;

        let text = format!(
            "{px};{py};{pz};{ox};{oy};{oz};{point_count};{};{};{}",
            millis(performance.overall),
            millis(performance.signal),
            millis(performance.tracking),
        );

        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Encode one byte per character. Characters above U+00FF are rejected.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>> {
        self.text
            .chars()
            .enumerate()
            .map(|(offset, ch)| {
                u8::try_from(u32::from(ch)).map_err(|_| BridgeError::NotByteText { offset })
            })
            .collect()
    }

    /// Parse a payload by the fixed field order.
    pub fn parse(text: &str) -> Result<ParsedReport> {
        let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(BridgeError::MalformedReport(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                fields.len()
            )));
        }

        let position = [
            parse_field::<i32>(&fields, 0)?,
            parse_field::<i32>(&fields, 1)?,
            parse_field::<i32>(&fields, 2)?,
        ];
        let orientation = [
            parse_field::<f32>(&fields, 3)?,
            parse_field::<f32>(&fields, 4)?,
            parse_field::<f32>(&fields, 5)?,
        ];

        Ok(ParsedReport {
            pose: Pose::new(position, orientation),
            point_count: parse_field(&fields, 6)?,
            overall: parse_millis(&fields, 7)?,
            signal: parse_millis(&fields, 8)?,
            tracking: parse_millis(&fields, 9)?,
        })
    }
}

/// Values recovered from a report payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedReport {
    pub pose: Pose,
    pub point_count: u32,
    pub overall: Duration,
    pub signal: Duration,
    pub tracking: Duration,
}

fn millis(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64() * 1000.0)
}

fn parse_field<T: std::str::FromStr>(fields: &[&str], index: usize) -> Result<T> {
    fields[index].trim().parse::<T>().map_err(|_| {
        BridgeError::MalformedReport(format!("field {} is invalid: '{}'", index, fields[index]))
    })
}

fn parse_millis(fields: &[&str], index: usize) -> Result<Duration> {
    let ms: f64 = parse_field(fields, index)?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(BridgeError::MalformedReport(format!(
            "field {} is not a non-negative duration: '{}'",
            index, fields[index]
        )));
    }
    Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| {
        BridgeError::MalformedReport(format!(
            "field {} is out of range: '{}'",
            index, fields[index]
        ))
    })
}
