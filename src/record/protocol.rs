//! # Record Protocol Constants and Types
//!
//! Core definitions shared by the decoder, encoder and validator: record
//! kinds, field values, the timestamp format and the inbound sum type.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;

/// Timestamp layout used on the wire and in stored files
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Length of a rendered timestamp (`2024-08-07T13:00:00`)
pub const TIMESTAMP_LEN: usize = 19;

/// Length of the kind marker on transit lines
pub const MARKER_LEN: usize = 1;

/// Shortest transit line that can hold a marker, a timestamp and a delimiter
pub const MIN_TRANSIT_LEN: usize = MARKER_LEN + TIMESTAMP_LEN + 1;

/// Field delimiter
pub const DELIMITER: char = ',';

/// Leading character of a free-text message payload
pub const MESSAGE_MARKER: char = 'M';

/// Number of compass points resolved by the vane
pub const COMPASS_POINTS: usize = 16;

/// Direction value for "not measured" (no wind run or unknown vane)
pub const DIRECTION_UNMEASURED: i64 = 18;

/// Hours per day (size of the daily pressure array)
pub const HOURS_PER_DAY: usize = 24;

/// Compass labels indexed by direction 0-15
pub const COMPASS_LABELS: [&str; COMPASS_POINTS] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Field indices of a realtime record
pub mod realtime {
    /// Rain tip counter (cumulative since device midnight)
    pub const RAIN_TIPS: usize = 0;
    /// Anemometer revolutions in the last sample window
    pub const REVS: usize = 1;
    /// Peak revolutions reported by the device
    pub const PEAK_REVS: usize = 2;
    /// Vane direction (decoded compass index)
    pub const DIRECTION: usize = 3;
    /// First sensor field copied into hourly records
    pub const FIRST_SENSOR: usize = 4;
}

/// Field indices of an hourly record
pub mod hourly {
    pub const RAIN: usize = 0;
    pub const SPEED: usize = 1;
    pub const GUST: usize = 2;
    pub const DIRECTION: usize = 3;
    pub const TEMPERATURE: usize = 4;
    pub const HUMIDITY: usize = 5;
    pub const PRESSURE: usize = 6;
    pub const LIGHT_A: usize = 7;
    pub const LIGHT_B: usize = 8;
    /// Carried unchanged into the daily record's closing field
    pub const CLOSING: usize = 9;
}

/// Number of fields in a daily record
pub const DAILY_FIELD_COUNT: usize = 11;

/// Minimum transit field count the hourly layout relies on
pub const MIN_REALTIME_FIELDS: usize = hourly::CLOSING + 1;

/// Kind of a telemetry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Short-interval raw sample from the roof unit
    Realtime,
    /// Hourly rollup
    Hourly,
    /// Daily rollup
    Daily,
}

impl RecordKind {
    /// One-character marker used on transit lines and file names
    pub fn marker(self) -> char {
        match self {
            RecordKind::Realtime => 'R',
            RecordKind::Hourly => 'H',
            RecordKind::Daily => 'D',
        }
    }

    /// Parse a marker character
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'R' => Some(RecordKind::Realtime),
            'H' => Some(RecordKind::Hourly),
            'D' => Some(RecordKind::Daily),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Realtime => "realtime",
            RecordKind::Hourly => "hourly",
            RecordKind::Daily => "daily",
        };
        f.write_str(name)
    }
}

/// A single numeric field
///
/// Device-unit readings stay integral; converted physical quantities are floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

impl FieldValue {
    /// Value as a float regardless of representation
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Int(v) => v as f64,
            FieldValue::Float(v) => v,
        }
    }

    /// Value as an integer; floats are rounded
    pub fn as_i64(&self) -> i64 {
        match *self {
            FieldValue::Int(v) => v,
            FieldValue::Float(v) => v.round() as i64,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, FieldValue::Float(_))
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Int(0)
    }
}

/// A finalized telemetry record
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub kind: RecordKind,
    pub timestamp: NaiveDateTime,
    pub values: Vec<FieldValue>,
}

impl TelemetryRecord {
    pub fn new(kind: RecordKind, timestamp: NaiveDateTime, values: Vec<FieldValue>) -> Self {
        Self {
            kind,
            timestamp,
            values,
        }
    }

    /// Field at `index`, or `Int(0)` when the record is shorter
    pub fn value(&self, index: usize) -> FieldValue {
        self.values.get(index).copied().unwrap_or_default()
    }
}

/// Origin of a free-text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Raised locally by this logger
    Station,
    /// Forwarded from the roof unit
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Station => f.write_str("Station"),
            Origin::Remote => f.write_str("Remote"),
        }
    }
}

/// A timestamped free-text message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub timestamp: NaiveDateTime,
    pub origin: Origin,
    pub text: String,
}

impl Message {
    pub fn new(timestamp: NaiveDateTime, origin: Origin, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            origin,
            text: text.into(),
        }
    }

    /// Line written to the monthly message log
    pub fn log_entry(&self) -> String {
        format!(
            "{} [{}]: {}",
            format_timestamp(&self.timestamp),
            self.origin,
            self.text
        )
    }
}

/// Result of decoding one inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Realtime sample, to be folded into the hour aggregator
    Realtime(TelemetryRecord),
    /// Catch-up hourly record, to be stored directly
    Hourly(TelemetryRecord),
    /// Free-text message from the roof unit
    Message(Message),
}

/// Parse a 19-character timestamp
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

/// Render a timestamp in the 19-character wire format
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Truncate a timestamp to the start of its hour
pub fn truncate_to_hour(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .date()
        .and_hms_opt(timestamp.hour(), 0, 0)
        .unwrap_or(timestamp)
}

/// The hour after `timestamp`, truncated
pub fn next_hour(timestamp: NaiveDateTime) -> NaiveDateTime {
    truncate_to_hour(timestamp) + Duration::hours(1)
}

/// Year and month whose monthly file a timestamp belongs to
///
/// Midnight on the 1st closes the last day of the previous month, so it is
/// attributed to that month.
pub fn effective_month(timestamp: &NaiveDateTime) -> (i32, u32) {
    let (year, month) = (timestamp.year(), timestamp.month());
    if timestamp.day() == 1 && timestamp.hour() == 0 {
        previous_month(year, month)
    } else {
        (year, month)
    }
}

/// The calendar month before `(year, month)`
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Default pointer value when nothing has been stored yet (device epoch)
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
