//! # Record Decoder
//!
//! Decodes transit lines from the roof unit and stored lines from the monthly
//! files into [`TelemetryRecord`]s.

use chrono::NaiveDateTime;
use tracing::debug;

use super::protocol::*;
use super::vane::decode_direction;
use super::Codec;
use crate::error::{Result, StationError};

/// Parse one numeric field; a decimal point makes it a float
fn parse_field(text: &str) -> Option<FieldValue> {
    let text = text.trim();
    if text.contains('.') {
        text.parse::<f64>().ok().map(FieldValue::Float)
    } else {
        text.parse::<i64>().ok().map(FieldValue::Int)
    }
}

/// Split a delimited field list
///
/// The roof unit terminates some lines with a delimiter, so one trailing
/// empty field is dropped. Any other empty or non-numeric field fails.
pub(crate) fn split_fields(body: &str) -> Option<Vec<FieldValue>> {
    let body = body.trim_end_matches(['\r', '\n']);
    let body = body.strip_suffix(DELIMITER).unwrap_or(body);
    if body.is_empty() {
        return Some(Vec::new());
    }
    body.split(DELIMITER).map(parse_field).collect()
}

/// Split a transit line into marker, timestamp and field body
pub(crate) fn split_transit(raw: &str) -> Option<(char, NaiveDateTime, &str)> {
    let marker = raw.chars().next()?;
    let stamp = raw.get(MARKER_LEN..MARKER_LEN + TIMESTAMP_LEN)?;
    let timestamp = parse_timestamp(stamp)?;
    let rest = raw.get(MARKER_LEN + TIMESTAMP_LEN..)?;
    let body = rest.strip_prefix(DELIMITER)?;
    Some((marker, timestamp, body))
}

impl Codec {
    /// Decode an inbound payload from the roof unit
    ///
    /// # Arguments
    ///
    /// * `raw` - complete payload including the leading marker
    /// * `previous_direction` - last resolved vane direction (realtime only)
    /// * `received` - arrival time, used for messages without their own timestamp
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Validation`] if:
    /// - The marker is unknown or is a daily marker
    /// - The timestamp slice does not parse
    /// - The field count does not match the transit schema
    pub fn parse_inbound(
        &self,
        raw: &str,
        previous_direction: u8,
        received: NaiveDateTime,
    ) -> Result<Inbound> {
        let raw = raw.trim_end_matches(['\r', '\n']);

        if let Some(body) = raw.strip_prefix(MESSAGE_MARKER) {
            return Ok(Inbound::Message(decode_message(body, received)?));
        }

        let (marker, timestamp, body) = split_transit(raw).ok_or_else(|| {
            StationError::Validation(format!("Malformed transit line: {:?}", raw))
        })?;

        let values = split_fields(body)
            .ok_or_else(|| StationError::Validation(format!("Non-numeric field in {:?}", raw)))?;

        if values.len() != self.schema().realtime_fields {
            return Err(StationError::Validation(format!(
                "Expected {} fields, got {}",
                self.schema().realtime_fields,
                values.len()
            )));
        }

        match RecordKind::from_marker(marker) {
            Some(RecordKind::Realtime) => Ok(Inbound::Realtime(self.decode_realtime(
                timestamp,
                values,
                previous_direction,
            ))),
            Some(RecordKind::Hourly) => Ok(Inbound::Hourly(
                self.decode_catchup_hourly(timestamp, values),
            )),
            _ => Err(StationError::Validation(format!(
                "Unexpected marker '{}'",
                marker
            ))),
        }
    }

    /// Decode a line read back from a monthly file
    ///
    /// Stored lines carry no marker; the kind comes from the file. Returns
    /// `None` for header lines, malformed lines and lines whose field count
    /// differs from the kind's schema.
    pub fn parse_stored(&self, kind: RecordKind, raw: &str) -> Option<TelemetryRecord> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let timestamp = parse_timestamp(raw.get(..TIMESTAMP_LEN)?)?;
        let body = raw.get(TIMESTAMP_LEN..)?.strip_prefix(DELIMITER)?;
        let values = split_fields(body)?;

        if values.len() != self.schema().fields_for(kind) {
            debug!(
                "Stored {} line has {} fields, expected {}",
                kind,
                values.len(),
                self.schema().fields_for(kind)
            );
            return None;
        }

        Some(TelemetryRecord::new(kind, timestamp, values))
    }

    /// Realtime: device units kept, vane reading resolved to a compass index
    fn decode_realtime(
        &self,
        timestamp: NaiveDateTime,
        mut values: Vec<FieldValue>,
        previous_direction: u8,
    ) -> TelemetryRecord {
        let cal = self.calibration();
        let raw_vane = values[realtime::DIRECTION].as_i64();
        let direction = decode_direction(
            raw_vane,
            previous_direction,
            &cal.vane_points,
            cal.vane_tolerance,
        );
        values[realtime::DIRECTION] = FieldValue::Int(i64::from(direction));
        TelemetryRecord::new(RecordKind::Realtime, timestamp, values)
    }

    /// Catch-up hourly: the roof unit's hour totals converted to physical units
    fn decode_catchup_hourly(
        &self,
        timestamp: NaiveDateTime,
        values: Vec<FieldValue>,
    ) -> TelemetryRecord {
        let cal = self.calibration();
        let tips = values[realtime::RAIN_TIPS].as_f64();
        let revs = values[realtime::REVS].as_f64();
        let peak = values[realtime::PEAK_REVS].as_f64();
        let direction = values[realtime::DIRECTION].as_i64();
        let direction = if (0..COMPASS_POINTS as i64).contains(&direction) {
            direction
        } else {
            DIRECTION_UNMEASURED
        };

        let mut out = Vec::with_capacity(values.len());
        out.push(FieldValue::Float(tips * cal.rain_per_bucket));
        out.push(FieldValue::Float(
            revs * cal.speed_per_rev / f64::from(cal.samples_per_hour),
        ));
        out.push(FieldValue::Float(peak * cal.speed_per_rev));
        out.push(FieldValue::Int(direction));
        out.extend_from_slice(&values[realtime::FIRST_SENSOR..]);

        TelemetryRecord::new(RecordKind::Hourly, timestamp, out)
    }
}

/// Message body: optional 19-char timestamp followed by free text
fn decode_message(body: &str, received: NaiveDateTime) -> Result<Message> {
    if body.trim().is_empty() {
        return Err(StationError::Validation("Empty message".to_string()));
    }

    let stamped = body
        .get(..TIMESTAMP_LEN)
        .and_then(parse_timestamp)
        .zip(body.get(TIMESTAMP_LEN..));

    Ok(match stamped {
        Some((timestamp, text)) => Message::new(timestamp, Origin::Remote, text.trim()),
        None => Message::new(received, Origin::Remote, body.trim()),
    })
}
