//! # Durable Store Module
//!
//! Append-only monthly files for hourly and daily records, the monthly
//! message log and the latest-record pointer.
//!
//! This module handles:
//! - Strictly increasing appends guarded by the pointer
//! - Month attribution (midnight on the 1st closes the previous month)
//! - Startup recovery of records stored after a stale pointer
//! - Working out which missing hours to request from the roof unit
//!
//! Layout under the store root:
//!
//! ```text
//! csv/H<yyyy>-<mm>.csv   hourly records, header line first
//! csv/D<yyyy>-<mm>.csv   daily records, header line first
//! log/M<yyyy>-<mm>.log   message log
//! Latest.txt             <hourly-timestamp>;<daily-timestamp>
//! ```
//!
//! Appending a record and rewriting the pointer are two separate steps. A
//! crash between them leaves the record on disk with a stale pointer; recovery
//! returns such records so the pointer can be moved past them.

pub mod catchup;
pub mod latest;

pub use catchup::{CatchupCoordinator, CatchupRequest};
pub use latest::{LatestPointer, LATEST_FILE};

use chrono::NaiveDateTime;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{Result, StationError};
use crate::record::encoder::serialize;
use crate::record::protocol::*;
use crate::record::Codec;

const CSV_DIR: &str = "csv";
const LOG_DIR: &str = "log";

/// Records found after the pointer during startup recovery, oldest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovered {
    pub hourly: Vec<TelemetryRecord>,
    pub daily: Vec<TelemetryRecord>,
}

/// File-backed record store
#[derive(Debug)]
pub struct DurableStore {
    root: PathBuf,
    config: StorageConfig,
    codec: Codec,
    latest: LatestPointer,
}

impl DurableStore {
    /// Open the store, creating its directories and loading the pointer
    ///
    /// # Errors
    ///
    /// Returns error if the directories cannot be created or the pointer file
    /// exists but cannot be read.
    pub fn open(config: &StorageConfig, codec: Codec) -> Result<Self> {
        let root = PathBuf::from(&config.root_dir);
        fs::create_dir_all(root.join(CSV_DIR))?;
        fs::create_dir_all(root.join(LOG_DIR))?;

        let latest = LatestPointer::load(&root.join(LATEST_FILE))?;
        info!(
            "Opened store at {} (latest hourly {}, daily {})",
            root.display(),
            format_timestamp(&latest.hourly),
            format_timestamp(&latest.daily)
        );

        Ok(Self {
            root,
            config: config.clone(),
            codec,
            latest,
        })
    }

    pub fn latest(&self) -> &LatestPointer {
        &self.latest
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Monthly file for a kind and `(year, month)`
    pub fn monthly_path(&self, kind: RecordKind, (year, month): (i32, u32)) -> PathBuf {
        self.root
            .join(CSV_DIR)
            .join(format!("{}{:04}-{:02}.csv", kind.marker(), year, month))
    }

    /// Message log file for `(year, month)`
    pub fn message_log_path(&self, (year, month): (i32, u32)) -> PathBuf {
        self.root
            .join(LOG_DIR)
            .join(format!("{}{:04}-{:02}.log", MESSAGE_MARKER, year, month))
    }

    fn header(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Daily => &self.config.daily_header,
            _ => &self.config.hourly_header,
        }
    }

    /// Reject anything at or before the pointer for its kind
    fn check_order(&self, record: &TelemetryRecord) -> Result<()> {
        let latest = self.latest.get(record.kind).ok_or_else(|| {
            StationError::Validation(format!("{} records are not stored", record.kind))
        })?;

        if record.timestamp <= latest {
            return Err(StationError::OutOfOrderWrite {
                kind: record.kind,
                timestamp: record.timestamp,
                latest,
            });
        }
        Ok(())
    }

    fn commit_pointer(&mut self, kind: RecordKind, timestamp: NaiveDateTime) -> Result<()> {
        let mut latest = self.latest;
        latest.set(kind, timestamp);
        latest.save(&self.root.join(LATEST_FILE))?;
        self.latest = latest;
        Ok(())
    }

    /// Append a record to its monthly file and advance the pointer
    ///
    /// # Errors
    ///
    /// - [`StationError::OutOfOrderWrite`] if the record is not newer than
    ///   the pointer; nothing is written
    /// - [`StationError::Validation`] for realtime records
    /// - [`StationError::Io`] if the file or pointer cannot be written
    pub fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        self.check_order(record)?;

        let path = self.monthly_path(record.kind, effective_month(&record.timestamp));
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut block = String::new();
        if is_new {
            block.push_str(self.header(record.kind));
            block.push('\n');
        }
        block.push_str(&serialize(record, false));
        block.push('\n');
        file.write_all(block.as_bytes())?;
        file.flush()?;

        self.commit_pointer(record.kind, record.timestamp)?;
        info!("Stored {} record {}", record.kind, format_timestamp(&record.timestamp));
        Ok(())
    }

    /// Move the pointer past a record that is already on disk
    ///
    /// Used when replaying recovered records; the record itself is not
    /// written again.
    pub fn acknowledge(&mut self, record: &TelemetryRecord) -> Result<()> {
        self.check_order(record)?;
        self.commit_pointer(record.kind, record.timestamp)?;
        debug!(
            "Pointer advanced past recovered {} record {}",
            record.kind,
            format_timestamp(&record.timestamp)
        );
        Ok(())
    }

    /// Append a line to the monthly message log
    pub fn append_message(&self, message: &Message) -> Result<()> {
        let path = self.message_log_path(effective_month(&message.timestamp));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", message.log_entry())?;
        Ok(())
    }

    /// Scan the current and previous month for records after the pointer
    ///
    /// # Arguments
    ///
    /// * `now` - Current time; selects which monthly files are scanned
    ///
    /// # Returns
    ///
    /// Records strictly newer than the pointer for their kind, oldest first.
    /// Unparseable lines (including headers) are skipped.
    pub fn recover(&self, now: NaiveDateTime) -> Result<Recovered> {
        let current = effective_month(&now);
        let months = [previous_month(current.0, current.1), current];

        let mut recovered = Recovered::default();
        for (kind, out) in [
            (RecordKind::Hourly, &mut recovered.hourly),
            (RecordKind::Daily, &mut recovered.daily),
        ] {
            let latest = self.latest.get(kind).unwrap_or_else(epoch);
            for month in months {
                let path = self.monthly_path(kind, month);
                let contents = match fs::read_to_string(&path) {
                    Ok(contents) => contents,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };

                out.extend(
                    contents
                        .lines()
                        .filter_map(|line| self.codec.parse_stored(kind, line))
                        .filter(|record| record.timestamp > latest),
                );
            }
            out.sort_by_key(|record| record.timestamp);
            out.dedup_by_key(|record| record.timestamp);
        }

        if !recovered.hourly.is_empty() || !recovered.daily.is_empty() {
            warn!(
                "Recovered {} hourly and {} daily records past the stored pointer",
                recovered.hourly.len(),
                recovered.daily.len()
            );
        }
        Ok(recovered)
    }
}
