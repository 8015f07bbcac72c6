//! # Payload Validator
//!
//! Structural acceptance check run on every inbound payload before decoding.
//! Rejected payloads are dropped without retry: the next periodic sample or a
//! catch-up response supersedes them.

use super::decoder::{split_fields, split_transit};
use super::protocol::*;
use crate::config::SchemaConfig;

/// Check an inbound payload
///
/// # Arguments
///
/// * `raw` - Payload including its leading marker
/// * `expected_headers` - Markers accepted in this context
/// * `is_message` - Whether the payload arrived on the message path
/// * `schema` - Field counts per record kind
///
/// # Returns
///
/// `true` if the payload can be decoded. Never panics on malformed input.
pub fn validate(
    raw: &str,
    expected_headers: &[char],
    is_message: bool,
    schema: &SchemaConfig,
) -> bool {
    let raw = raw.trim_end_matches(['\r', '\n']);

    if is_message {
        return raw
            .strip_prefix(MESSAGE_MARKER)
            .map(|body| !body.trim().is_empty())
            .unwrap_or(false);
    }

    let Some(marker) = raw.chars().next() else {
        return false;
    };
    if !expected_headers.contains(&marker) || raw.len() < MIN_TRANSIT_LEN {
        return false;
    }

    let Some(kind) = RecordKind::from_marker(marker) else {
        return false;
    };

    let Some((_, _, body)) = split_transit(raw) else {
        return false;
    };

    // Transit hourly lines share the realtime layout
    let expected = match kind {
        RecordKind::Realtime | RecordKind::Hourly => schema.realtime_fields,
        RecordKind::Daily => schema.daily_fields,
    };

    split_fields(body)
        .map(|fields| fields.len() == expected)
        .unwrap_or(false)
}

impl super::Codec {
    /// [`validate`] against this codec's schema
    pub fn validate(&self, raw: &str, expected_headers: &[char], is_message: bool) -> bool {
        validate(raw, expected_headers, is_message, self.schema())
    }
}
