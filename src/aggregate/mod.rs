//! # Aggregation Module
//!
//! Rolls realtime samples up into hourly records and hourly records up into
//! daily records.
//!
//! This module handles:
//! - Hour accumulation of rain, wind run, gust and direction histogram
//! - Day accumulation of totals, extremes and the hourly pressure series
//! - Resetting both accumulators after each flush

pub mod day;
pub mod hour;

pub use day::{DayAccumulator, DayAggregator, PressureTrend};
pub use hour::{HourAccumulator, HourAggregator, HourlyFlush};

use crate::record::protocol::{hourly, FieldValue, TelemetryRecord};

/// Estimated wind run for an hourly record built elsewhere
///
/// Catch-up and recovered hourly records arrive without the hour's raw
/// revolution count, so it is reconstructed from the stored average speed.
pub fn estimated_wind_run(record: &TelemetryRecord, samples_per_hour: u32) -> f64 {
    record.value(hourly::SPEED).as_f64() * f64::from(samples_per_hour)
}

/// Running minimum and maximum of one quantity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Extremes {
    pub min: Option<FieldValue>,
    pub max: Option<FieldValue>,
}

impl Extremes {
    pub fn fold(&mut self, value: FieldValue) {
        let v = value.as_f64();
        if self.min.map_or(true, |m| v < m.as_f64()) {
            self.min = Some(value);
        }
        if self.max.map_or(true, |m| v > m.as_f64()) {
            self.max = Some(value);
        }
    }

    /// Minimum, or `Int(0)` when nothing was folded
    pub fn min_or_default(&self) -> FieldValue {
        self.min.unwrap_or_default()
    }

    /// Maximum, or `Int(0)` when nothing was folded
    pub fn max_or_default(&self) -> FieldValue {
        self.max.unwrap_or_default()
    }
}
