//! # Wind Vane
//!
//! Converts raw vane ADC readings to compass indices and resolves an hour's
//! direction histogram into a single dominant direction.
//!
//! ## Decoding
//!
//! The vane reports a 12-bit reading on a circle: 4095 sits next to 0. Each of
//! the 16 compass points has a calibrated reading; a sample maps to the
//! circularly nearest point. Readings that fall between two points (within the
//! configured tolerance of being equidistant) are ambiguous, and the point
//! closest to the previously resolved direction wins, which keeps the output
//! from flickering across a sector boundary or across the 4095/0 wrap.
//!
//! ## Resolution
//!
//! The hourly direction is the vector sum of the wind run recorded against each
//! compass point, rounded back to the nearest point.

use std::fmt;

use super::protocol::{COMPASS_POINTS, DIRECTION_UNMEASURED};

/// Full ADC span of the vane input
pub const ADC_SPAN: i32 = 4096;

/// Degrees between adjacent compass points
pub const DEGREES_PER_POINT: f64 = 360.0 / COMPASS_POINTS as f64;

/// Quality of an hour's direction resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionDiagnostic {
    /// No wind run recorded against any compass point
    Unmeasurable,
    /// Direction resolved from the histogram
    Measured {
        /// Share of the hour's wind run that carried a direction (percent)
        coverage_pct: f64,
        /// Resultant length over total run: 1.0 steady, near 0.0 variable
        consistency: f64,
    },
}

impl fmt::Display for DirectionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionDiagnostic::Unmeasurable => {
                write!(f, "WD cover not measurable: no anemometer revs in hour")
            }
            DirectionDiagnostic::Measured {
                coverage_pct,
                consistency,
            } => write!(
                f,
                "WD coverage: {:.1}%; consistency: {:.2}",
                coverage_pct, consistency
            ),
        }
    }
}

fn circular_distance(a: i32, b: i32, span: i32) -> i32 {
    let d = (a - b).rem_euclid(span);
    d.min(span - d)
}

/// Decode a raw vane reading into a compass index (0-15)
///
/// # Arguments
///
/// * `raw` - ADC reading (0-4095); values outside are wrapped onto the circle
/// * `previous` - last resolved direction, used only to break ties
/// * `points` - calibrated reading for each compass point
/// * `tolerance` - ADC counts within which two candidates are treated as tied
///
/// # Examples
///
/// ```
/// use weather_logger::record::vane::decode_direction;
///
/// let points: Vec<u16> = (0..16).map(|i| i * 256).collect();
/// assert_eq!(decode_direction(1030, 0, &points, 16), 4); // E
/// ```
pub fn decode_direction(raw: i64, previous: u8, points: &[u16], tolerance: u16) -> u8 {
    let raw = (raw.rem_euclid(i64::from(ADC_SPAN))) as i32;

    let mut ranked: Vec<(i32, usize)> = points
        .iter()
        .enumerate()
        .map(|(i, &p)| (circular_distance(raw, i32::from(p), ADC_SPAN), i))
        .collect();
    ranked.sort_unstable();

    let Some(&(best, best_ix)) = ranked.first() else {
        return previous;
    };

    let previous = i32::from(previous) % COMPASS_POINTS as i32;
    ranked
        .iter()
        .take_while(|(d, _)| d - best <= i32::from(tolerance))
        .min_by_key(|(d, i)| {
            (
                circular_distance(*i as i32, previous, COMPASS_POINTS as i32),
                *d,
            )
        })
        .map(|&(_, i)| i as u8)
        .unwrap_or(best_ix as u8)
}

/// Resolve a 16-slot wind-run histogram into a dominant direction
///
/// # Arguments
///
/// * `histogram` - wind run accumulated per compass point
/// * `total_run` - all wind run in the hour, including samples without a direction
///
/// # Returns
///
/// The direction index, or [`DIRECTION_UNMEASURED`] when the histogram is
/// empty, plus a diagnostic describing the resolution.
pub fn resolve_direction(
    histogram: &[u64; COMPASS_POINTS],
    total_run: u64,
) -> (i64, DirectionDiagnostic) {
    let covered = histogram.iter().fold(0u64, |sum, &run| sum.saturating_add(run));
    if covered == 0 {
        return (DIRECTION_UNMEASURED, DirectionDiagnostic::Unmeasurable);
    }

    let (mut east, mut north) = (0.0f64, 0.0f64);
    for (i, &run) in histogram.iter().enumerate() {
        let theta = (i as f64 * DEGREES_PER_POINT).to_radians();
        east += run as f64 * theta.sin();
        north += run as f64 * theta.cos();
    }

    let consistency = east.hypot(north) / covered as f64;
    let bearing = east.atan2(north).to_degrees().rem_euclid(360.0);
    let direction = ((bearing / DEGREES_PER_POINT).round() as i64) % COMPASS_POINTS as i64;

    let coverage_pct = if total_run == 0 {
        100.0
    } else {
        covered as f64 / total_run as f64 * 100.0
    };

    (
        direction,
        DirectionDiagnostic::Measured {
            coverage_pct,
            consistency,
        },
    )
}
