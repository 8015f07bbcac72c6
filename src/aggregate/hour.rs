//! # Hour Aggregator
//!
//! Accumulates realtime samples into the statistics of one hour.

use chrono::NaiveDateTime;

use crate::config::CalibrationConfig;
use crate::record::protocol::*;
use crate::record::vane::{resolve_direction, DirectionDiagnostic};

/// Per-hour running totals, reset after every flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HourAccumulator {
    /// Anemometer revolutions summed over the hour
    pub revolutions: u64,
    /// Rain bucket tips in the hour
    pub rain_tips: u64,
    /// Largest single-sample revolution count
    pub gust_max: u64,
    /// Revolutions recorded against each compass point
    pub histogram: [u64; COMPASS_POINTS],
    pub samples: u32,
}

/// Output of an hour flush
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFlush {
    pub record: TelemetryRecord,
    pub diagnostic: DirectionDiagnostic,
    /// Hour wind run (revolutions x speed per revolution) for the day totals
    pub wind_run: f64,
}

/// Hour aggregator
///
/// The roof unit reports its rain counter cumulatively since its own
/// midnight, so the last counter value is kept across hour resets and tips
/// are taken as deltas. A counter that goes backwards has been reset and its
/// new value is the delta.
#[derive(Debug, Clone)]
pub struct HourAggregator {
    calibration: CalibrationConfig,
    field_count: usize,
    acc: HourAccumulator,
    rain_counter: Option<i64>,
}

impl HourAggregator {
    /// Create an aggregator producing hourly records of `field_count` fields
    pub fn new(calibration: CalibrationConfig, field_count: usize) -> Self {
        Self {
            calibration,
            field_count,
            acc: HourAccumulator::default(),
            rain_counter: None,
        }
    }

    /// Fold one realtime sample into the hour
    pub fn update(&mut self, record: &TelemetryRecord) {
        // Totals saturate; a garbled float field decodes to i64::MAX
        let revs = record.value(realtime::REVS).as_i64().max(0) as u64;
        self.acc.revolutions = self.acc.revolutions.saturating_add(revs);
        self.acc.gust_max = self.acc.gust_max.max(revs);

        let direction = record.value(realtime::DIRECTION).as_i64();
        if let Some(slot) = usize::try_from(direction)
            .ok()
            .and_then(|d| self.acc.histogram.get_mut(d))
        {
            *slot = slot.saturating_add(revs);
        }

        let counter = record.value(realtime::RAIN_TIPS).as_i64().max(0);
        let tips = match self.rain_counter {
            Some(previous) if counter >= previous => counter - previous,
            Some(_) => counter,
            None => 0,
        };
        self.rain_counter = Some(counter);
        self.acc.rain_tips = self.acc.rain_tips.saturating_add(tips as u64);

        self.acc.samples = self.acc.samples.saturating_add(1);
    }

    /// Build the hourly record and reset the accumulator
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Latest realtime sample; its sensor fields are copied
    ///   verbatim. Missing fields are written as zero.
    /// * `timestamp` - Time of the rollover; truncated to the hour
    pub fn flush(
        &mut self,
        snapshot: Option<&TelemetryRecord>,
        timestamp: NaiveDateTime,
    ) -> HourlyFlush {
        let acc = std::mem::take(&mut self.acc);
        let cal = &self.calibration;

        let speed = if acc.samples == 0 {
            0.0
        } else {
            acc.revolutions as f64 * cal.speed_per_rev / f64::from(acc.samples)
        };
        let (direction, diagnostic) = resolve_direction(&acc.histogram, acc.revolutions);

        let mut values = Vec::with_capacity(self.field_count);
        values.push(FieldValue::Float(acc.rain_tips as f64 * cal.rain_per_bucket));
        values.push(FieldValue::Float(speed));
        values.push(FieldValue::Float(acc.gust_max as f64 * cal.speed_per_rev));
        values.push(FieldValue::Int(direction));
        for i in realtime::FIRST_SENSOR..self.field_count {
            values.push(snapshot.map(|r| r.value(i)).unwrap_or_default());
        }

        HourlyFlush {
            record: TelemetryRecord::new(
                RecordKind::Hourly,
                truncate_to_hour(timestamp),
                values,
            ),
            diagnostic,
            wind_run: acc.revolutions as f64 * cal.speed_per_rev,
        }
    }

    /// Discard the hour's totals
    pub fn reset(&mut self) {
        self.acc = HourAccumulator::default();
    }

    pub fn accumulator(&self) -> &HourAccumulator {
        &self.acc
    }
}
