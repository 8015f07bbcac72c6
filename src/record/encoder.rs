//! # Record Encoder
//!
//! Renders [`TelemetryRecord`]s as delimited lines and as display text.

use super::protocol::*;
use crate::error::{Result, StationError};

/// How one field is rendered in display text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSpec {
    /// Number followed by a unit suffix
    Suffix(String),
    /// Direction index rendered as a compass label
    Compass,
}

impl UnitSpec {
    /// Parse a configured unit; `com` selects compass rendering
    pub fn parse(unit: &str) -> Self {
        if unit == "com" {
            UnitSpec::Compass
        } else {
            UnitSpec::Suffix(unit.to_string())
        }
    }
}

/// Render field values fixed-point
///
/// Integers are written verbatim. The first float field (rain) gets two
/// decimals and every later float gets one.
fn format_values(values: &[FieldValue]) -> Vec<String> {
    let mut seen_float = false;
    values
        .iter()
        .map(|value| match *value {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Float(v) if !seen_float => {
                seen_float = true;
                format!("{:.2}", v)
            }
            FieldValue::Float(v) => format!("{:.1}", v),
        })
        .collect()
}

/// Serialize a record as one delimited line (no trailing newline)
///
/// # Arguments
///
/// * `record` - Record to serialize
/// * `with_marker` - Prefix the kind marker, as on transit and display lines.
///   Stored lines omit it.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use weather_logger::record::encoder::serialize;
/// use weather_logger::record::protocol::{FieldValue, RecordKind, TelemetryRecord};
///
/// let ts = NaiveDate::from_ymd_opt(2024, 8, 7).unwrap().and_hms_opt(13, 0, 0).unwrap();
/// let record = TelemetryRecord::new(
///     RecordKind::Hourly,
///     ts,
///     vec![FieldValue::Float(0.2794), FieldValue::Float(3.24), FieldValue::Int(4)],
/// );
/// assert_eq!(serialize(&record, false), "2024-08-07T13:00:00,0.28,3.2,4");
/// ```
pub fn serialize(record: &TelemetryRecord, with_marker: bool) -> String {
    let mut line = String::with_capacity(MARKER_LEN + TIMESTAMP_LEN + record.values.len() * 6);
    if with_marker {
        line.push(record.kind.marker());
    }
    line.push_str(&format_timestamp(&record.timestamp));
    for field in format_values(&record.values) {
        line.push(DELIMITER);
        line.push_str(&field);
    }
    line
}

/// Render a record as human-readable text
///
/// One `value+unit` line per field. Direction fields out of the compass range
/// render as `---`.
///
/// # Errors
///
/// Returns [`StationError::Format`] if `units` does not cover every field.
pub fn to_display_text(record: &TelemetryRecord, units: &[UnitSpec]) -> Result<String> {
    if units.len() < record.values.len() {
        return Err(StationError::Format(format!(
            "{} record has {} fields but only {} units",
            record.kind,
            record.values.len(),
            units.len()
        )));
    }

    let mut lines = Vec::with_capacity(record.values.len());

    let rendered = format_values(&record.values);
    for ((value, text), unit) in record.values.iter().zip(rendered).zip(units) {
        lines.push(match unit {
            UnitSpec::Compass => usize::try_from(value.as_i64())
                .ok()
                .and_then(|i| COMPASS_LABELS.get(i))
                .map(|label| label.to_string())
                .unwrap_or_else(|| "---".to_string()),
            UnitSpec::Suffix(suffix) => format!("{}{}", text, suffix),
        });
    }

    Ok(lines.join("\n"))
}
