//! # Record Codec Module
//!
//! Parsing, validation and rendering of the delimited text records exchanged
//! with the roof unit and kept in the monthly files.
//!
//! This module handles:
//! - Transit lines (`<marker><timestamp>,<fields...>`) from the roof unit
//! - Stored lines (`<timestamp>,<fields...>`) read back from monthly files
//! - Conversion of device units (tips, revolutions, vane ADC) to physical units
//! - Fixed-point serialization and display text

pub mod protocol;
pub mod decoder;
pub mod encoder;
pub mod validator;
pub mod vane;

use crate::config::{CalibrationConfig, SchemaConfig};

/// Schema-aware codec for telemetry records
///
/// Holds the configured field counts and unit conversion constants. The codec
/// itself is stateless: the vane continuity hint is passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    schema: SchemaConfig,
    calibration: CalibrationConfig,
}

impl Codec {
    pub fn new(schema: SchemaConfig, calibration: CalibrationConfig) -> Self {
        Self {
            schema,
            calibration,
        }
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn calibration(&self) -> &CalibrationConfig {
        &self.calibration
    }
}
