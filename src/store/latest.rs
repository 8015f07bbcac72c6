//! # Latest Pointer
//!
//! Durable cursor holding the timestamps of the newest stored hourly and
//! daily records. Persisted as a single line `<hourly>;<daily>`.

use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{Result, StationError};
use crate::record::protocol::{epoch, format_timestamp, parse_timestamp, RecordKind, TIMESTAMP_LEN};

/// Pointer file name under the store root
pub const LATEST_FILE: &str = "Latest.txt";

const SEPARATOR: char = ';';

/// Newest stored timestamp per stored kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestPointer {
    pub hourly: NaiveDateTime,
    pub daily: NaiveDateTime,
}

impl Default for LatestPointer {
    fn default() -> Self {
        Self {
            hourly: epoch(),
            daily: epoch(),
        }
    }
}

impl LatestPointer {
    /// Latest timestamp for a kind; realtime records are never stored
    pub fn get(&self, kind: RecordKind) -> Option<NaiveDateTime> {
        match kind {
            RecordKind::Hourly => Some(self.hourly),
            RecordKind::Daily => Some(self.daily),
            RecordKind::Realtime => None,
        }
    }

    pub fn set(&mut self, kind: RecordKind, timestamp: NaiveDateTime) {
        match kind {
            RecordKind::Hourly => self.hourly = timestamp,
            RecordKind::Daily => self.daily = timestamp,
            RecordKind::Realtime => {}
        }
    }

    /// Parse the pointer line
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (hourly, daily) = line.split_once(SEPARATOR)?;
        Some(Self {
            hourly: parse_timestamp(hourly.get(..TIMESTAMP_LEN)?)?,
            daily: parse_timestamp(daily.get(..TIMESTAMP_LEN)?)?,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "{}{}{}",
            format_timestamp(&self.hourly),
            SEPARATOR,
            format_timestamp(&self.daily)
        )
    }

    /// Load the pointer file
    ///
    /// A missing file means nothing has been stored yet: both timestamps fall
    /// back to the device epoch and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Io`] if the file exists but cannot be read, or
    /// [`StationError::Validation`] if its contents do not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No pointer file at {}, starting from epoch", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let line = contents.lines().next().unwrap_or_default();
        Self::parse(line).ok_or_else(|| {
            StationError::Validation(format!(
                "Unreadable pointer file {}: {:?}",
                path.display(),
                line
            ))
        })
    }

    /// Rewrite the pointer file
    ///
    /// The new contents go to a sibling temp file which is then renamed over
    /// the old one, so a crash leaves either the old or the new pointer.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, format!("{}\n", self.render()))?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
