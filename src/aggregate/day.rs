//! # Day Aggregator
//!
//! Accumulates hourly records into the statistics of one day.

use chrono::{NaiveDateTime, Timelike};
use std::iter;

use super::Extremes;
use crate::record::protocol::*;

/// Three-class pressure tendency over a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureTrend {
    Rising,
    Falling,
    Steady,
}

impl PressureTrend {
    /// Stored value: 1 rising, -1 falling, 0 steady
    pub fn code(self) -> i64 {
        match self {
            PressureTrend::Rising => 1,
            PressureTrend::Falling => -1,
            PressureTrend::Steady => 0,
        }
    }

    /// Classify an hour-indexed pressure series
    ///
    /// Empty slots are zero. The hour-0 reading closes the day, so the series
    /// runs 1..23 then 0. The first and last readings are compared and a
    /// difference within `steady_band` is steady.
    pub fn classify(pressure: &[f64; HOURS_PER_DAY], steady_band: f64) -> Self {
        let readings: Vec<f64> = (1..HOURS_PER_DAY)
            .chain(iter::once(0))
            .map(|h| pressure[h])
            .filter(|&p| p != 0.0)
            .collect();

        match (readings.first(), readings.last()) {
            (Some(first), Some(last)) if last - first > steady_band => PressureTrend::Rising,
            (Some(first), Some(last)) if first - last > steady_band => PressureTrend::Falling,
            _ => PressureTrend::Steady,
        }
    }
}

/// Per-day running totals, reset after every flush
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayAccumulator {
    pub rain: f64,
    pub wind_run: f64,
    pub gust_max: f64,
    pub temperature: Extremes,
    pub humidity: Extremes,
    /// Both light channels folded into one pair
    pub light: Extremes,
    pub pressure: [f64; HOURS_PER_DAY],
    pub hours: u32,
}

/// Day aggregator
#[derive(Debug, Clone)]
pub struct DayAggregator {
    steady_band: f64,
    acc: DayAccumulator,
}

impl DayAggregator {
    pub fn new(steady_band: f64) -> Self {
        Self {
            steady_band,
            acc: DayAccumulator::default(),
        }
    }

    /// Fold one hourly record into the day
    ///
    /// # Arguments
    ///
    /// * `record` - Hourly record
    /// * `wind_run` - The hour's wind run, taken from the hour flush
    pub fn update(&mut self, record: &TelemetryRecord, wind_run: f64) {
        let acc = &mut self.acc;
        acc.rain += record.value(hourly::RAIN).as_f64();
        acc.wind_run += wind_run;
        acc.gust_max = acc.gust_max.max(record.value(hourly::GUST).as_f64());

        acc.temperature.fold(record.value(hourly::TEMPERATURE));
        acc.humidity.fold(record.value(hourly::HUMIDITY));
        acc.light.fold(record.value(hourly::LIGHT_A));
        acc.light.fold(record.value(hourly::LIGHT_B));

        acc.pressure[record.timestamp.hour() as usize] = record.value(hourly::PRESSURE).as_f64();
        acc.hours += 1;
    }

    /// Build the daily record and reset the accumulator
    ///
    /// Average gust divides the day's single largest gust by the hour count,
    /// matching the records already stored by earlier station software.
    ///
    /// # Arguments
    ///
    /// * `last_hourly` - The day's closing hourly record
    /// * `timestamp` - Time of the rollover; truncated to the hour
    pub fn flush(
        &mut self,
        last_hourly: Option<&TelemetryRecord>,
        timestamp: NaiveDateTime,
    ) -> TelemetryRecord {
        let acc = std::mem::take(&mut self.acc);
        let per_hour = |total: f64| {
            if acc.hours == 0 {
                0.0
            } else {
                total / f64::from(acc.hours)
            }
        };

        let trend = PressureTrend::classify(&acc.pressure, self.steady_band);
        let closing = last_hourly
            .map(|r| r.value(hourly::CLOSING))
            .unwrap_or_default();

        let values = vec![
            FieldValue::Float(acc.rain),
            FieldValue::Float(per_hour(acc.wind_run)),
            FieldValue::Float(per_hour(acc.gust_max)),
            acc.temperature.max_or_default(),
            acc.temperature.min_or_default(),
            acc.humidity.max_or_default(),
            acc.humidity.min_or_default(),
            FieldValue::Int(trend.code()),
            acc.light.max_or_default(),
            acc.light.min_or_default(),
            closing,
        ];

        TelemetryRecord::new(RecordKind::Daily, truncate_to_hour(timestamp), values)
    }

    /// Discard the day's totals
    pub fn reset(&mut self) {
        self.acc = DayAccumulator::default();
    }

    pub fn accumulator(&self) -> &DayAccumulator {
        &self.acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn hour(
        at: &str,
        rain: f64,
        gust: f64,
        temp: i64,
        pressure: i64,
        light: (i64, i64),
    ) -> TelemetryRecord {
        TelemetryRecord::new(
            RecordKind::Hourly,
            ts(at),
            vec![
                FieldValue::Float(rain),
                FieldValue::Float(2.0),
                FieldValue::Float(gust),
                FieldValue::Int(4),
                FieldValue::Int(temp),
                FieldValue::Int(60 + temp),
                FieldValue::Int(pressure),
                FieldValue::Int(light.0),
                FieldValue::Int(light.1),
                FieldValue::Int(3300 + temp),
            ],
        )
    }

    #[test]
    fn test_update_accumulates() {
        let mut agg = DayAggregator::new(1.0);
        agg.update(&hour("2024-08-07T01:00:00", 0.5, 4.0, 12, 1010, (0, 5)), 100.0);
        agg.update(&hour("2024-08-07T02:00:00", 0.25, 9.0, 10, 1011, (3, 900)), 50.0);

        let acc = agg.accumulator();
        assert!((acc.rain - 0.75).abs() < 1e-9);
        assert!((acc.wind_run - 150.0).abs() < 1e-9);
        assert_eq!(acc.gust_max, 9.0);
        assert_eq!(acc.temperature.min, Some(FieldValue::Int(10)));
        assert_eq!(acc.temperature.max, Some(FieldValue::Int(12)));
        assert_eq!(acc.light.min, Some(FieldValue::Int(0)));
        assert_eq!(acc.light.max, Some(FieldValue::Int(900)));
        assert_eq!(acc.pressure[1], 1010.0);
        assert_eq!(acc.pressure[2], 1011.0);
        assert_eq!(acc.hours, 2);
    }

    #[test]
    fn test_flush_values() {
        let mut agg = DayAggregator::new(1.0);
        let mut last = None;
        for h in 1..=24u32 {
            let at = if h == 24 {
                "2024-08-08T00:00:00".to_string()
            } else {
                format!("2024-08-07T{:02}:00:00", h)
            };
            let gust = if h == 15 { 12.0 } else { 3.0 };
            let r = hour(&at, 0.1, gust, h as i64, 1000 + h as i64, (h as i64, 0));
            agg.update(&r, 96.0);
            last = Some(r);
        }

        let daily = agg.flush(last.as_ref(), ts("2024-08-08T00:00:03"));

        assert_eq!(daily.kind, RecordKind::Daily);
        assert_eq!(daily.timestamp, ts("2024-08-08T00:00:00"));
        assert_eq!(daily.values.len(), DAILY_FIELD_COUNT);
        assert!((daily.value(0).as_f64() - 2.4).abs() < 1e-9);
        assert!((daily.value(1).as_f64() - 96.0).abs() < 1e-9);
        // Largest gust divided by the hour count
        assert!((daily.value(2).as_f64() - 0.5).abs() < 1e-9);
        assert_eq!(daily.value(3), FieldValue::Int(24));
        assert_eq!(daily.value(4), FieldValue::Int(1));
        assert_eq!(daily.value(5), FieldValue::Int(84));
        assert_eq!(daily.value(6), FieldValue::Int(61));
        assert_eq!(daily.value(7), FieldValue::Int(1));
        assert_eq!(daily.value(8), FieldValue::Int(24));
        assert_eq!(daily.value(9), FieldValue::Int(0));
        assert_eq!(daily.value(10), FieldValue::Int(3324));
    }

    #[test]
    fn test_flush_with_zero_hours() {
        let mut agg = DayAggregator::new(1.0);
        let daily = agg.flush(None, ts("2024-08-08T00:00:00"));

        assert_eq!(daily.values.len(), DAILY_FIELD_COUNT);
        assert_eq!(daily.value(1), FieldValue::Float(0.0));
        assert_eq!(daily.value(2), FieldValue::Float(0.0));
        assert_eq!(daily.value(7), FieldValue::Int(0));
        assert_eq!(daily.value(10), FieldValue::Int(0));
    }

    #[test]
    fn test_flush_resets_state() {
        let mut agg = DayAggregator::new(1.0);
        agg.update(&hour("2024-08-07T05:00:00", 1.0, 2.0, 3, 1000, (1, 2)), 10.0);
        agg.flush(None, ts("2024-08-08T00:00:00"));
        assert_eq!(*agg.accumulator(), DayAccumulator::default());
    }

    #[test]
    fn test_trend_classification() {
        let mut p = [0.0; HOURS_PER_DAY];
        assert_eq!(PressureTrend::classify(&p, 1.0), PressureTrend::Steady);

        p[1] = 1010.0;
        p[12] = 1008.0;
        p[0] = 1013.0; // closes the day
        assert_eq!(PressureTrend::classify(&p, 1.0), PressureTrend::Rising);

        p[0] = 1006.0;
        assert_eq!(PressureTrend::classify(&p, 1.0), PressureTrend::Falling);

        p[0] = 1010.5;
        assert_eq!(PressureTrend::classify(&p, 1.0), PressureTrend::Steady);
    }

    #[test]
    fn test_trend_codes() {
        assert_eq!(PressureTrend::Rising.code(), 1);
        assert_eq!(PressureTrend::Falling.code(), -1);
        assert_eq!(PressureTrend::Steady.code(), 0);
    }
}
