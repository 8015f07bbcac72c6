//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, StationError};
use crate::record::encoder::UnitSpec;
use crate::record::protocol::{RecordKind, COMPASS_POINTS, DAILY_FIELD_COUNT, MIN_REALTIME_FIELDS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub serial: SerialConfig,
    pub storage: StorageConfig,
    pub schema: SchemaConfig,
    pub calibration: CalibrationConfig,
    pub station: StationConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Roof link serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Durable store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    #[serde(default = "default_hourly_header")]
    pub hourly_header: String,

    #[serde(default = "default_daily_header")]
    pub daily_header: String,
}

/// Field counts per record kind
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SchemaConfig {
    /// Fields on a realtime or catch-up hourly transit line
    #[serde(default = "default_realtime_fields")]
    pub realtime_fields: usize,

    /// Fields on a stored hourly line
    #[serde(default = "default_hourly_fields")]
    pub hourly_fields: usize,

    /// Fields on a stored daily line
    #[serde(default = "default_daily_fields")]
    pub daily_fields: usize,
}

/// Device-to-physical unit conversion constants
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Rainfall (mm) per bucket tip
    #[serde(default = "default_rain_per_bucket")]
    pub rain_per_bucket: f64,

    /// Wind speed per anemometer revolution in one sample window
    #[serde(default = "default_speed_per_rev")]
    pub speed_per_rev: f64,

    /// Nominal realtime samples per hour on the roof unit
    #[serde(default = "default_samples_per_hour")]
    pub samples_per_hour: u32,

    /// Vane ADC reading for each compass point, N clockwise
    #[serde(default = "default_vane_points")]
    pub vane_points: Vec<u16>,

    /// ADC counts within which two compass points are considered ambiguous
    #[serde(default = "default_vane_tolerance")]
    pub vane_tolerance: u16,

    /// Pressure change (hPa) over a day still classed as steady
    #[serde(default = "default_pressure_steady_band")]
    pub pressure_steady_band: f64,
}

/// Orchestrator timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_watchdog_timeout_s")]
    pub watchdog_timeout_s: u64,

    #[serde(default = "default_message_capacity")]
    pub message_capacity: usize,
}

/// Unit suffixes used when rendering records as text
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_realtime_units")]
    pub realtime_units: Vec<String>,

    #[serde(default = "default_hourly_units")]
    pub hourly_units: Vec<String>,

    #[serde(default = "default_daily_units")]
    pub daily_units: Vec<String>,
}

/// Diagnostic log file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file_enabled: bool,

    #[serde(default = "default_log_dir")]
    pub dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_root_dir() -> String { "./data".to_string() }
fn default_hourly_header() -> String {
    [
        "Timestamp", "Rain", "Speed", "Gust", "Direction", "Temperature", "Humidity", "Pressure",
        "LightA", "LightB", "Supply",
    ]
    .join(",")
}
fn default_daily_header() -> String {
    [
        "Timestamp", "Rain", "Speed", "Gust", "MaxTemp", "MinTemp", "MaxHum", "MinHum", "Trend",
        "MaxLight", "MinLight", "Supply",
    ]
    .join(",")
}

fn default_realtime_fields() -> usize { 10 }
fn default_hourly_fields() -> usize { 10 }
fn default_daily_fields() -> usize { DAILY_FIELD_COUNT }

fn default_rain_per_bucket() -> f64 { 0.2794 }
fn default_speed_per_rev() -> f64 { 0.8 }
fn default_samples_per_hour() -> u32 { 1200 }
fn default_vane_points() -> Vec<u16> { (0..COMPASS_POINTS as u16).map(|i| i * 256).collect() }
fn default_vane_tolerance() -> u16 { 16 }
fn default_pressure_steady_band() -> f64 { 1.0 }

fn default_tick_interval_ms() -> u64 { 1500 }
fn default_watchdog_timeout_s() -> u64 { 30 }
fn default_message_capacity() -> usize { 20 }

fn units(list: &[&str]) -> Vec<String> { list.iter().map(|u| u.to_string()).collect() }
fn default_realtime_units() -> Vec<String> {
    units(&[" tips", " revs", " revs", "com", "°C", "%", "hPa", " lux", " lux", " mV"])
}
fn default_hourly_units() -> Vec<String> {
    units(&["mm", "km/h", "km/h", "com", "°C", "%", "hPa", " lux", " lux", " mV"])
}
fn default_daily_units() -> Vec<String> {
    units(&["mm", "km/h", "km/h", "°C", "°C", "%", "%", "", " lux", " lux", " mV"])
}

fn default_log_dir() -> String { "./logs".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            hourly_header: default_hourly_header(),
            daily_header: default_daily_header(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            realtime_fields: default_realtime_fields(),
            hourly_fields: default_hourly_fields(),
            daily_fields: default_daily_fields(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            rain_per_bucket: default_rain_per_bucket(),
            speed_per_rev: default_speed_per_rev(),
            samples_per_hour: default_samples_per_hour(),
            vane_points: default_vane_points(),
            vane_tolerance: default_vane_tolerance(),
            pressure_steady_band: default_pressure_steady_band(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            watchdog_timeout_s: default_watchdog_timeout_s(),
            message_capacity: default_message_capacity(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            realtime_units: default_realtime_units(),
            hourly_units: default_hourly_units(),
            daily_units: default_daily_units(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: false,
            dir: default_log_dir(),
        }
    }
}

impl SchemaConfig {
    /// Stored field count for a kind; realtime uses the transit count
    pub fn fields_for(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Realtime => self.realtime_fields,
            RecordKind::Hourly => self.hourly_fields,
            RecordKind::Daily => self.daily_fields,
        }
    }
}

impl DisplayConfig {
    /// Parsed unit specs for a record kind
    pub fn units_for(&self, kind: RecordKind) -> Vec<UnitSpec> {
        let list = match kind {
            RecordKind::Realtime => &self.realtime_units,
            RecordKind::Hourly => &self.hourly_units,
            RecordKind::Daily => &self.daily_units,
        };
        list.iter().map(|u| UnitSpec::parse(u)).collect()
    }
}

fn invalid(message: impl std::fmt::Display) -> StationError {
    StationError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use weather_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400",
            ));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.storage.root_dir.is_empty() {
            return Err(invalid("storage root_dir cannot be empty"));
        }

        if self.storage.hourly_header.is_empty() || self.storage.daily_header.is_empty() {
            return Err(invalid("storage headers cannot be empty"));
        }

        // The hourly layout copies realtime fields 4.. and the daily record
        // carries hourly field 9, so the shapes are tied together
        if self.schema.realtime_fields < MIN_REALTIME_FIELDS {
            return Err(invalid(format!(
                "realtime_fields must be at least {}",
                MIN_REALTIME_FIELDS
            )));
        }

        if self.schema.hourly_fields != self.schema.realtime_fields {
            return Err(invalid("hourly_fields must equal realtime_fields"));
        }

        if self.schema.daily_fields != DAILY_FIELD_COUNT {
            return Err(invalid(format!("daily_fields must be {}", DAILY_FIELD_COUNT)));
        }

        if self.calibration.rain_per_bucket <= 0.0 || self.calibration.speed_per_rev <= 0.0 {
            return Err(invalid("rain_per_bucket and speed_per_rev must be positive"));
        }

        if self.calibration.samples_per_hour == 0 {
            return Err(invalid("samples_per_hour must be greater than 0"));
        }

        if self.calibration.vane_points.len() != COMPASS_POINTS {
            return Err(invalid(format!(
                "vane_points must list exactly {} ADC readings",
                COMPASS_POINTS
            )));
        }

        if self.calibration.vane_points.iter().any(|&p| p > 4095) {
            return Err(invalid("vane_points must be between 0 and 4095"));
        }

        if self.calibration.pressure_steady_band < 0.0 {
            return Err(invalid("pressure_steady_band cannot be negative"));
        }

        if self.station.tick_interval_ms < 100 || self.station.tick_interval_ms > 10000 {
            return Err(invalid("tick_interval_ms must be between 100 and 10000"));
        }

        if self.station.watchdog_timeout_s == 0 {
            return Err(invalid("watchdog_timeout_s must be greater than 0"));
        }

        if self.station.message_capacity == 0 {
            return Err(invalid("message_capacity must be greater than 0"));
        }

        for (kind, list) in [
            (RecordKind::Realtime, &self.display.realtime_units),
            (RecordKind::Hourly, &self.display.hourly_units),
            (RecordKind::Daily, &self.display.daily_units),
        ] {
            if list.len() < self.schema.fields_for(kind) {
                return Err(invalid(format!(
                    "{} display units must cover all {} fields",
                    kind,
                    self.schema.fields_for(kind)
                )));
            }
        }

        if self.logging.file_enabled && self.logging.dir.is_empty() {
            return Err(invalid("logging dir cannot be empty when file logging is enabled"));
        }

        Ok(())
    }
}
