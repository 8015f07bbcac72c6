//! Dead-source watchdog.
//!
//! Fires once when no valid telemetry has arrived within the timeout, then
//! stays latched until the next valid telemetry.

use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_seen: NaiveDateTime,
    armed: bool,
}

impl Watchdog {
    pub fn new(timeout: Duration, now: NaiveDateTime) -> Self {
        Self {
            timeout,
            last_seen: now,
            armed: true,
        }
    }

    /// Record valid telemetry; re-arms a fired alarm
    pub fn feed(&mut self, now: NaiveDateTime) {
        self.last_seen = now;
        self.armed = true;
    }

    /// Returns `true` exactly once per silent period
    pub fn check(&mut self, now: NaiveDateTime) -> bool {
        if self.armed && now - self.last_seen > self.timeout {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn is_alarmed(&self) -> bool {
        !self.armed
    }
}
