//! # Station Module
//!
//! The fixed-interval loop that ties the codec, aggregators and store
//! together.
//!
//! Each tick:
//! 1. Drain at most one telemetry payload and one message payload
//! 2. Run the dead-source watchdog
//! 3. If the roof unit owes stored hours, request the next one and stop
//! 4. Otherwise, on an hour change, flush the hour (and at midnight the day)

pub mod clock;
pub mod mailbox;
pub mod messages;
pub mod watchdog;

pub use clock::{Clock, ManualClock, SystemClock};
pub use mailbox::{Mailbox, PayloadKind};
pub use messages::MessageLog;
pub use watchdog::Watchdog;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregate::{
    estimated_wind_run, DayAccumulator, DayAggregator, HourAccumulator, HourAggregator,
};
use crate::config::{Config, DisplayConfig};
use crate::error::Result;
use crate::record::encoder::to_display_text;
use crate::record::protocol::*;
use crate::record::Codec;
use crate::store::{CatchupCoordinator, DurableStore};

/// Markers accepted on the telemetry path
const TELEMETRY_HEADERS: [char; 2] = ['R', 'H'];

/// Outbound request channel to the roof unit
#[cfg_attr(test, mockall::automock)]
pub trait RequestSink {
    /// Send one request line, e.g. `H07:13`
    fn publish(&mut self, line: &str) -> Result<()>;
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    /// Nothing due this tick
    Idle,
    /// A catch-up request was sent; local hour synthesis skipped
    CatchupPending,
    /// An hour rollover was processed
    Ready,
}

/// Weather station orchestrator
pub struct Station<S: RequestSink, C: Clock> {
    codec: Codec,
    store: DurableStore,
    hour: HourAggregator,
    day: DayAggregator,
    coordinator: CatchupCoordinator,
    watchdog: Watchdog,
    messages: MessageLog,
    mailbox: Arc<Mailbox>,
    sink: S,
    clock: C,
    display: DisplayConfig,
    samples_per_hour: u32,
    previous_hour: u32,
    previous_direction: u8,
    /// Midnight that opened the day being accumulated
    day_opened: NaiveDateTime,
    snapshot: Option<TelemetryRecord>,
    latest: HashMap<RecordKind, TelemetryRecord>,
}

impl<S: RequestSink, C: Clock> Station<S, C> {
    /// Build a station around an opened store
    pub fn new(
        config: &Config,
        store: DurableStore,
        mailbox: Arc<Mailbox>,
        sink: S,
        clock: C,
    ) -> Self {
        let now = clock.now();
        let watchdog_timeout = Duration::seconds(config.station.watchdog_timeout_s as i64);

        Self {
            codec: Codec::new(config.schema.clone(), config.calibration.clone()),
            store,
            hour: HourAggregator::new(config.calibration.clone(), config.schema.hourly_fields),
            day: DayAggregator::new(config.calibration.pressure_steady_band),
            coordinator: CatchupCoordinator::new(now),
            watchdog: Watchdog::new(watchdog_timeout, now),
            messages: MessageLog::new(config.station.message_capacity),
            mailbox,
            sink,
            clock,
            display: config.display.clone(),
            samples_per_hour: config.calibration.samples_per_hour,
            previous_hour: now.hour(),
            previous_direction: 0,
            day_opened: start_of_day(now),
            snapshot: None,
            latest: HashMap::new(),
        }
    }

    /// Recover stored state and fix the catch-up horizon
    ///
    /// Records found after a stale pointer are replayed: the pointer moves
    /// past them and hours of the open day are folded back into the day totals.
    ///
    /// # Errors
    ///
    /// Returns error if the monthly files cannot be read.
    pub fn startup(&mut self) -> Result<()> {
        let now = self.clock.now();
        let recovered = self.store.recover(now)?;
        self.day_opened = start_of_day(now);

        for record in &recovered.hourly {
            if let Err(e) = self.store.acknowledge(record) {
                warn!("Recovered hourly record skipped: {}", e);
                continue;
            }
            self.fold_into_day(record);
            self.latest.insert(RecordKind::Hourly, record.clone());
        }

        for record in &recovered.daily {
            if let Err(e) = self.store.acknowledge(record) {
                warn!("Recovered daily record skipped: {}", e);
                continue;
            }
            self.latest.insert(RecordKind::Daily, record.clone());
        }

        self.coordinator = CatchupCoordinator::new(now);
        self.previous_hour = now.hour();
        self.watchdog.feed(now);

        self.post(Message::new(
            now,
            Origin::Station,
            format!(
                "Station startup completed ({} hourly, {} daily recovered)",
                recovered.hourly.len(),
                recovered.daily.len()
            ),
        ));
        Ok(())
    }

    /// Run one scheduling step
    pub fn tick(&mut self) -> StationState {
        let now = self.clock.now();

        if let Some(raw) = self.mailbox.take(PayloadKind::Telemetry) {
            self.ingest_telemetry(&raw, now);
        }
        if let Some(raw) = self.mailbox.take(PayloadKind::Message) {
            self.ingest_message(&raw, now);
        }

        if self.watchdog.check(now) {
            warn!("No telemetry from roof unit");
            self.post(Message::new(now, Origin::Station, "No recent telemetry"));
        }

        if let Some(request) = self.coordinator.due(self.store.latest(), now) {
            let line = request.to_string();
            info!("Requesting catch-up {}", line);
            if let Err(e) = self.sink.publish(&line) {
                warn!("Failed to send catch-up request {}: {}", line, e);
            }
            return StationState::CatchupPending;
        }

        if now.hour() == self.previous_hour {
            return StationState::Idle;
        }

        self.roll_hour(now);
        self.previous_hour = now.hour();
        StationState::Ready
    }

    fn ingest_telemetry(&mut self, raw: &str, now: NaiveDateTime) {
        if !self.codec.validate(raw, &TELEMETRY_HEADERS, false) {
            debug!("Dropped invalid telemetry: {:?}", raw);
            return;
        }

        let inbound = match self.codec.parse_inbound(raw, self.previous_direction, now) {
            Ok(inbound) => inbound,
            Err(e) => {
                debug!("Dropped undecodable telemetry: {}", e);
                return;
            }
        };
        self.watchdog.feed(now);

        match inbound {
            Inbound::Realtime(record) => {
                let direction = record.value(realtime::DIRECTION).as_i64();
                self.previous_direction =
                    u8::try_from(direction).unwrap_or(self.previous_direction);
                self.hour.update(&record);
                self.snapshot = Some(record.clone());
                self.latest.insert(RecordKind::Realtime, record);
            }
            Inbound::Hourly(record) => {
                info!("Catch-up hourly record {}", format_timestamp(&record.timestamp));
                if self.store_record(&record) {
                    self.fold_into_day(&record);
                }
                self.latest.insert(RecordKind::Hourly, record);
            }
            Inbound::Message(_) => debug!("Unexpected message on telemetry path"),
        }
    }

    fn ingest_message(&mut self, raw: &str, now: NaiveDateTime) {
        if !self.codec.validate(raw, &[MESSAGE_MARKER], true) {
            debug!("Dropped invalid message: {:?}", raw);
            return;
        }

        match self.codec.parse_inbound(raw, self.previous_direction, now) {
            Ok(Inbound::Message(message)) => self.post(message),
            Ok(other) => debug!("Unexpected payload on message path: {:?}", other),
            Err(e) => debug!("Dropped undecodable message: {}", e),
        }
    }

    /// Flush the hour, and at midnight the day
    fn roll_hour(&mut self, now: NaiveDateTime) {
        let flush = self.hour.flush(self.snapshot.as_ref(), now);
        self.post(Message::new(now, Origin::Station, flush.diagnostic.to_string()));

        self.store_record(&flush.record);
        self.day.update(&flush.record, flush.wind_run);

        if now.hour() == 0 {
            let daily = self.day.flush(Some(&flush.record), now);
            self.store_record(&daily);
            self.latest.insert(RecordKind::Daily, daily);
            self.day.reset();
            self.hour.reset();
            self.day_opened = start_of_day(now);
        }

        self.latest.insert(RecordKind::Hourly, flush.record);
    }

    /// Add an already rolled-up hour to the open day's totals
    ///
    /// Hours outside the open day are stored but not counted.
    fn fold_into_day(&mut self, record: &TelemetryRecord) {
        if !within_day(record, self.day_opened) {
            info!(
                "Hourly record {} outside the day opened {}, not counted in daily totals",
                format_timestamp(&record.timestamp),
                format_timestamp(&self.day_opened)
            );
            return;
        }
        let wind_run = estimated_wind_run(record, self.samples_per_hour);
        self.day.update(record, wind_run);
    }

    /// Append to the store; a rejection is posted as a station message
    fn store_record(&mut self, record: &TelemetryRecord) -> bool {
        match self.store.append(record) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                let text = format!(
                    "{} record {} not stored: {}",
                    record.kind,
                    format_timestamp(&record.timestamp),
                    e
                );
                self.post(Message::new(self.clock.now(), Origin::Station, text));
                false
            }
        }
    }

    /// Keep a message in memory and mirror it to the monthly log
    fn post(&mut self, message: Message) {
        info!("{}", message.log_entry());
        if let Err(e) = self.store.append_message(&message) {
            warn!("Failed to log message: {}", e);
        }
        self.messages.push(message);
    }

    /// Display text of the latest record of a kind
    ///
    /// Returns `(empty)` when nothing of that kind has been seen yet.
    pub fn display_text(&self, kind: RecordKind) -> Result<String> {
        match self.latest.get(&kind) {
            Some(record) => to_display_text(record, &self.display.units_for(kind)),
            None => Ok("(empty)".to_string()),
        }
    }

    pub fn latest_record(&self, kind: RecordKind) -> Option<&TelemetryRecord> {
        self.latest.get(&kind)
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    pub fn hour_accumulator(&self) -> &HourAccumulator {
        self.hour.accumulator()
    }

    pub fn day_accumulator(&self) -> &DayAccumulator {
        self.day.accumulator()
    }
}

/// Midnight at the start of `now`'s date
fn start_of_day(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_time(NaiveTime::MIN)
}

/// Whether an hourly record falls in the day opened at `day_opened`
///
/// A day runs from its 01:00 record through the next midnight record, which
/// closes it.
fn within_day(record: &TelemetryRecord, day_opened: NaiveDateTime) -> bool {
    record.timestamp > day_opened && record.timestamp <= day_opened + Duration::hours(24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PressureTrend;
    use crate::config::StorageConfig;
    use crate::store::LatestPointer;
    use mockall::Sequence;
    use tempfile::{tempdir, TempDir};

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    struct Harness {
        _dir: TempDir,
        mailbox: Arc<Mailbox>,
        clock: ManualClock,
        station: Station<MockRequestSink, ManualClock>,
    }

    /// Station booted at `boot` over a store whose pointer is `pointer`
    fn harness(boot: &str, pointer: LatestPointer, sink: MockRequestSink) -> Harness {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage = StorageConfig {
            root_dir: dir.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        pointer.save(&dir.path().join(crate::store::LATEST_FILE)).unwrap();

        let codec = Codec::new(config.schema.clone(), config.calibration.clone());
        let store = DurableStore::open(&config.storage, codec).unwrap();
        let mailbox = Arc::new(Mailbox::new());
        let clock = ManualClock::new(ts(boot));
        let mut station = Station::new(&config, store, Arc::clone(&mailbox), sink, clock.clone());
        station.startup().unwrap();

        Harness {
            _dir: dir,
            mailbox,
            clock,
            station,
        }
    }

    fn quiet_sink() -> MockRequestSink {
        let mut sink = MockRequestSink::new();
        sink.expect_publish().times(0);
        sink
    }

    fn up_to(hourly: &str, daily: &str) -> LatestPointer {
        LatestPointer {
            hourly: ts(hourly),
            daily: ts(daily),
        }
    }

    fn realtime_line(at: NaiveDateTime, tips: i64, revs: i64) -> String {
        weather_line(at, tips, revs, 21, 65, 1013, (40, 38))
    }

    fn weather_line(
        at: NaiveDateTime,
        tips: i64,
        revs: i64,
        temperature: i64,
        humidity: i64,
        pressure: i64,
        (light_a, light_b): (i64, i64),
    ) -> String {
        format!(
            "R{},{:04},{:04},{:04},1024,{},{},{},{},{},3300",
            format_timestamp(&at),
            tips,
            revs,
            revs,
            temperature,
            humidity,
            pressure,
            light_a,
            light_b
        )
    }

    fn count_messages(station: &Station<MockRequestSink, ManualClock>, text: &str) -> usize {
        station.messages().iter().filter(|m| m.text.contains(text)).count()
    }

    #[test]
    fn test_hour_then_day_rollover() {
        let mut h = harness(
            "2024-08-07T00:00:00",
            up_to("2024-08-07T00:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        let start = ts("2024-08-07T00:00:00");

        for i in 0..3600 {
            let at = start + Duration::seconds(i);
            h.clock.set(at);
            h.mailbox.submit(PayloadKind::Telemetry, realtime_line(at, i / 600, 3));
            assert_eq!(h.station.tick(), StationState::Idle);
        }
        assert_eq!(h.station.hour_accumulator().samples, 3600);

        h.clock.set(ts("2024-08-07T01:00:00"));
        assert_eq!(h.station.tick(), StationState::Ready);

        let record = h.station.latest_record(RecordKind::Hourly).unwrap().clone();
        assert_eq!(record.timestamp, ts("2024-08-07T01:00:00"));
        assert!((record.value(hourly::RAIN).as_f64() - 5.0 * 0.2794).abs() < 1e-9);
        assert!((record.value(hourly::SPEED).as_f64() - 2.4).abs() < 1e-9);
        assert_eq!(record.value(hourly::DIRECTION), FieldValue::Int(4));
        assert_eq!(h.station.store().latest().hourly, ts("2024-08-07T01:00:00"));
        assert_eq!(*h.station.hour_accumulator(), HourAccumulator::default());
        assert_eq!(h.station.day_accumulator().hours, 1);

        // Remaining hours of the day, the last one at midnight. One calm
        // sample per hour moves the sensor readings.
        for hour in 2..=24i64 {
            let at = start + Duration::hours(hour) - Duration::seconds(1);
            h.clock.set(at);
            h.mailbox.submit(
                PayloadKind::Telemetry,
                weather_line(
                    at,
                    5,
                    0,
                    10 + hour,
                    90 - hour,
                    1000 + hour,
                    (10 * hour, 5 * hour),
                ),
            );
            assert_eq!(h.station.tick(), StationState::Idle);

            h.clock.set(start + Duration::hours(hour));
            assert_eq!(h.station.tick(), StationState::Ready);
        }

        let daily = h.station.latest_record(RecordKind::Daily).unwrap();
        assert_eq!(daily.timestamp, ts("2024-08-08T00:00:00"));
        assert_eq!(daily.values.len(), 11);
        assert!((daily.value(0).as_f64() - 5.0 * 0.2794).abs() < 1e-9);
        // 10800 revs x 0.8 over 24 hours
        assert!((daily.value(1).as_f64() - 360.0).abs() < 1e-9);
        // Temperature 21 then 12..=34
        assert_eq!(daily.value(3), FieldValue::Int(34));
        assert_eq!(daily.value(4), FieldValue::Int(12));
        // Humidity 65 then 88 down to 66
        assert_eq!(daily.value(5), FieldValue::Int(88));
        assert_eq!(daily.value(6), FieldValue::Int(65));
        // Pressure 1013 at 01:00, 1024 on the closing midnight record
        assert_eq!(daily.value(7), FieldValue::Int(PressureTrend::Rising.code()));
        // Light channels 40/38 then 20..=240 and 10..=120
        assert_eq!(daily.value(8), FieldValue::Int(240));
        assert_eq!(daily.value(9), FieldValue::Int(10));
        assert_eq!(daily.value(10), FieldValue::Int(3300));

        let latest = h.station.store().latest();
        assert_eq!(latest.hourly, ts("2024-08-08T00:00:00"));
        assert_eq!(latest.daily, ts("2024-08-08T00:00:00"));
        assert_eq!(*h.station.hour_accumulator(), HourAccumulator::default());
        assert_eq!(*h.station.day_accumulator(), DayAccumulator::default());

        let stored = std::fs::read_to_string(
            h.station
                .store()
                .monthly_path(RecordKind::Hourly, (2024, 8)),
        )
        .unwrap();
        assert_eq!(stored.lines().count(), 1 + 24);
    }

    #[test]
    fn test_no_rollover_within_hour() {
        let mut h = harness(
            "2024-08-07T13:10:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        h.clock.set(ts("2024-08-07T13:59:59"));
        assert_eq!(h.station.tick(), StationState::Idle);
    }

    #[test]
    fn test_catchup_sequence() {
        let mut sink = MockRequestSink::new();
        let mut seq = Sequence::new();
        for line in ["H07:11", "H07:12", "H07:13"] {
            sink.expect_publish()
                .withf(move |l| l == line)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let mut h = harness(
            "2024-08-07T13:20:00",
            up_to("2024-08-07T10:00:00", "2024-08-07T00:00:00"),
            sink,
        );

        assert_eq!(h.station.tick(), StationState::CatchupPending);
        for hour in 11..=13 {
            h.mailbox.submit(
                PayloadKind::Telemetry,
                format!("H2024-08-07T{:02}:00:00,0001,2400,0010,0004,20,60,1012,30,31,3300", hour),
            );
            let expected = if hour < 13 {
                StationState::CatchupPending
            } else {
                StationState::Idle
            };
            assert_eq!(h.station.tick(), expected);
        }

        assert_eq!(h.station.store().latest().hourly, ts("2024-08-07T13:00:00"));
        assert_eq!(h.station.day_accumulator().hours, 3);
    }

    #[test]
    fn test_catchup_suppresses_rollover() {
        let mut sink = MockRequestSink::new();
        sink.expect_publish().returning(|_| Ok(()));
        let mut h = harness(
            "2024-08-07T13:20:00",
            up_to("2024-08-07T12:00:00", "2024-08-07T00:00:00"),
            sink,
        );

        h.clock.set(ts("2024-08-07T14:00:01"));
        assert_eq!(h.station.tick(), StationState::CatchupPending);
        assert_eq!(h.station.store().latest().hourly, ts("2024-08-07T12:00:00"));

        // Once the owed hour arrives, the deferred rollover runs
        h.mailbox.submit(
            PayloadKind::Telemetry,
            "H2024-08-07T13:00:00,0,0,0,18,20,60,1012,30,31,3300",
        );
        assert_eq!(h.station.tick(), StationState::Ready);
        assert_eq!(h.station.store().latest().hourly, ts("2024-08-07T14:00:00"));
    }

    #[test]
    fn test_watchdog_posts_once() {
        let mut h = harness(
            "2024-08-07T13:10:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );

        h.clock.set(ts("2024-08-07T13:10:31"));
        h.station.tick();
        h.clock.set(ts("2024-08-07T13:12:00"));
        h.station.tick();
        assert_eq!(count_messages(&h.station, "No recent telemetry"), 1);

        // Invalid telemetry does not clear the alarm
        h.mailbox.submit(PayloadKind::Telemetry, "Rgarbage");
        h.station.tick();
        h.clock.set(ts("2024-08-07T13:13:00"));
        h.station.tick();
        assert_eq!(count_messages(&h.station, "No recent telemetry"), 1);

        // Valid telemetry re-arms it
        let at = ts("2024-08-07T13:13:00");
        h.mailbox.submit(PayloadKind::Telemetry, realtime_line(at, 0, 1));
        h.station.tick();
        h.clock.set(ts("2024-08-07T13:13:31"));
        h.station.tick();
        assert_eq!(count_messages(&h.station, "No recent telemetry"), 2);
    }

    #[test]
    fn test_messages_logged() {
        let mut h = harness(
            "2024-08-07T13:10:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        h.mailbox
            .submit(PayloadKind::Message, "M2024-08-07T13:09:58 Roof restarted");
        h.station.tick();

        let latest = h.station.messages().latest().unwrap();
        assert_eq!(latest.origin, Origin::Remote);
        assert_eq!(latest.text, "Roof restarted");

        let log = std::fs::read_to_string(h.station.store().message_log_path((2024, 8))).unwrap();
        assert!(log.contains("[Remote]: Roof restarted"));
        assert!(log.contains("[Station]: Station startup completed"));
    }

    #[test]
    fn test_message_on_telemetry_slot_dropped() {
        let mut h = harness(
            "2024-08-07T13:10:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        h.mailbox
            .submit(PayloadKind::Telemetry, "M2024-08-07T13:09:58 Stray note");
        h.clock.set(ts("2024-08-07T13:10:31"));
        h.station.tick();

        assert_eq!(count_messages(&h.station, "Stray note"), 0);
        // Not telemetry either, so the watchdog still fires
        assert_eq!(count_messages(&h.station, "No recent telemetry"), 1);
    }

    #[test]
    fn test_stale_catchup_record_rejected() {
        let mut h = harness(
            "2024-08-07T13:10:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        h.mailbox.submit(
            PayloadKind::Telemetry,
            "H2024-08-07T12:00:00,0,0,0,18,20,60,1012,30,31,3300",
        );
        h.station.tick();

        assert_eq!(count_messages(&h.station, "not stored"), 1);
        assert_eq!(h.station.day_accumulator().hours, 0);
    }

    #[test]
    fn test_startup_replays_recovered_hours() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.root_dir = dir.path().to_string_lossy().into_owned();
        let codec = Codec::new(config.schema.clone(), config.calibration.clone());

        let mut store = DurableStore::open(&config.storage, codec.clone()).unwrap();
        for at in ["2024-08-07T00:00:00", "2024-08-07T01:00:00", "2024-08-07T02:00:00"] {
            let line = format!("{},0.28,1.5,3.0,4,20,60,1012,30,31,3300", at);
            store.append(&codec.parse_stored(RecordKind::Hourly, &line).unwrap()).unwrap();
        }
        drop(store);
        up_to("2024-08-06T23:00:00", "2024-08-06T00:00:00")
            .save(&dir.path().join(crate::store::LATEST_FILE))
            .unwrap();

        let store = DurableStore::open(&config.storage, codec).unwrap();
        let clock = ManualClock::new(ts("2024-08-07T02:30:00"));
        let mailbox = Arc::new(Mailbox::new());
        let mut station = Station::new(&config, store, mailbox, quiet_sink(), clock);
        station.startup().unwrap();

        assert_eq!(station.store().latest().hourly, ts("2024-08-07T02:00:00"));
        // The midnight record belongs to the previous day
        assert_eq!(station.day_accumulator().hours, 2);
        assert!((station.day_accumulator().wind_run - 2.0 * 1.5 * 1200.0).abs() < 1e-9);
        assert_eq!(
            station.latest_record(RecordKind::Hourly).map(|r| r.timestamp),
            Some(ts("2024-08-07T02:00:00"))
        );
    }

    #[test]
    fn test_saturated_revolutions_survive_tick() {
        let mut h = harness(
            "2024-08-07T13:05:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        let line = "R2024-08-07T13:05:09,0,99999999999999999999.0,1,1030,21,65,1013,40,38,3300";
        assert!(h.station.codec.validate(line, &TELEMETRY_HEADERS, false));

        for _ in 0..3 {
            h.mailbox.submit(PayloadKind::Telemetry, line);
            assert_eq!(h.station.tick(), StationState::Idle);
        }
        assert_eq!(h.station.hour_accumulator().samples, 3);
        assert_eq!(h.station.hour_accumulator().revolutions, u64::MAX);

        h.clock.set(ts("2024-08-07T14:00:00"));
        assert_eq!(h.station.tick(), StationState::Ready);
        assert_eq!(h.station.store().latest().hourly, ts("2024-08-07T14:00:00"));
    }

    #[test]
    fn test_catchup_past_midnight_counts_toward_closing_day() {
        let mut sink = MockRequestSink::new();
        sink.expect_publish().times(3).returning(|_| Ok(()));
        let mut h = harness(
            "2024-08-07T23:30:00",
            up_to("2024-08-07T20:00:00", "2024-08-07T00:00:00"),
            sink,
        );
        assert_eq!(h.station.tick(), StationState::CatchupPending);

        // The owed hours arrive after local midnight
        h.clock.set(ts("2024-08-08T00:05:00"));
        for hour in 21..=23 {
            h.mailbox.submit(
                PayloadKind::Telemetry,
                format!(
                    "H2024-08-07T{}:00:00,0001,0000,0000,0004,20,60,1012,30,31,3300",
                    hour
                ),
            );
            let state = h.station.tick();
            if hour < 23 {
                assert_eq!(state, StationState::CatchupPending);
            } else {
                assert_eq!(state, StationState::Ready);
            }
        }

        let daily = h.station.latest_record(RecordKind::Daily).unwrap();
        assert_eq!(daily.timestamp, ts("2024-08-08T00:00:00"));
        assert!((daily.value(0).as_f64() - 3.0 * 0.2794).abs() < 1e-9);
        assert_eq!(h.station.store().latest().daily, ts("2024-08-08T00:00:00"));
        assert_eq!(*h.station.day_accumulator(), DayAccumulator::default());
    }

    #[test]
    fn test_catchup_outside_open_day_not_counted() {
        let mut sink = MockRequestSink::new();
        sink.expect_publish().returning(|_| Ok(()));
        let mut h = harness(
            "2024-08-07T05:30:00",
            up_to("2024-08-06T22:00:00", "2024-08-06T00:00:00"),
            sink,
        );
        assert_eq!(h.station.tick(), StationState::CatchupPending);

        // Midnight record closes the previous day
        h.mailbox.submit(
            PayloadKind::Telemetry,
            "H2024-08-07T00:00:00,0001,0000,0000,0004,20,60,1012,30,31,3300",
        );
        h.station.tick();

        assert_eq!(h.station.store().latest().hourly, ts("2024-08-07T00:00:00"));
        assert_eq!(h.station.day_accumulator().hours, 0);
    }

    #[test]
    fn test_display_text() {
        let mut h = harness(
            "2024-08-07T13:10:00",
            up_to("2024-08-07T13:00:00", "2024-08-07T00:00:00"),
            quiet_sink(),
        );
        assert_eq!(h.station.display_text(RecordKind::Realtime).unwrap(), "(empty)");

        let at = ts("2024-08-07T13:10:00");
        h.mailbox.submit(PayloadKind::Telemetry, realtime_line(at, 2, 5));
        h.station.tick();

        let text = h.station.display_text(RecordKind::Realtime).unwrap();
        assert_eq!(text.lines().count(), 10);
        assert_eq!(text.lines().nth(3), Some("E"));
        assert_eq!(text.lines().nth(4), Some("21°C"));
    }
}
