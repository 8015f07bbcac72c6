//! # Weather Logger Library
//!
//! Ground-station logger for a roof-mounted weather sensor unit.
//!
//! This library provides the core functionality for validating and decoding
//! the roof unit's telemetry, rolling it up into hourly and daily records,
//! storing those records durably and backfilling gaps after downtime.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod record;
pub mod serial;
pub mod station;
pub mod store;
