//! # Weather Logger
//!
//! Logs telemetry from a roof-mounted weather unit over a serial link.
//!
//! The application receives realtime samples and messages from the roof
//! unit, builds hourly and daily records, stores them in monthly files and
//! asks the roof unit for any hours missed while it was down.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use weather_logger::config::{Config, LoggingConfig, SerialConfig};
use weather_logger::record::Codec;
use weather_logger::serial::{ChannelSink, StationLink};
use weather_logger::station::{Mailbox, Station, StationState, SystemClock};
use weather_logger::store::DurableStore;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of the rolling diagnostic log files
const LOG_FILE_PREFIX: &str = "weather-logger.log";

/// Install the tracing subscriber
///
/// Console output is always on; `RUST_LOG` overrides the INFO default. When
/// file logging is enabled a daily-rolling file layer is added and its
/// worker guard is returned, which must be held for the life of the process.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if config.file_enabled {
        let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Keep the roof link alive, reopening it after failures
async fn run_link(
    mut link: StationLink<tokio_serial::SerialStream>,
    mut requests: UnboundedReceiver<String>,
    config: SerialConfig,
    mailbox: Arc<Mailbox>,
) {
    let retry = Duration::from_millis(config.reconnect_interval_ms);
    loop {
        match link.run(&mut requests).await {
            Ok(()) => return,
            Err(e) => warn!("Roof link on {} lost: {}", link.device_path(), e),
        }

        link = loop {
            sleep(retry).await;
            match StationLink::open(&config, Arc::clone(&mailbox)) {
                Ok(link) => break link,
                Err(e) => debug!("Reconnect failed: {}", e),
            }
        };
        info!("Roof link restored at {}", link.device_path());
    }
}

/// Main entry point for the weather logger
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging
///    - Open the store and the roof link
///    - Recover stored state
///
/// 2. **Main Loop**
///    - Tick the station at the configured interval
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if the configuration, the store directory or the serial
/// port cannot be opened. Failures after startup are logged and survived.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("Weather logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let codec = Codec::new(config.schema.clone(), config.calibration.clone());
    let store = DurableStore::open(&config.storage, codec)
        .with_context(|| format!("Failed to open store at {}", config.storage.root_dir))?;

    let mailbox = Arc::new(Mailbox::new());
    let link = StationLink::open(&config.serial, Arc::clone(&mailbox))?;

    let (request_tx, request_rx) = unbounded_channel();
    let link_task = tokio::spawn(run_link(
        link,
        request_rx,
        config.serial.clone(),
        Arc::clone(&mailbox),
    ));

    let mut station = Station::new(
        &config,
        store,
        mailbox,
        ChannelSink::new(request_tx),
        SystemClock,
    );
    station.startup()?;

    let mut ticker = interval(Duration::from_millis(config.station.tick_interval_ms));
    info!("Ticking every {} ms", config.station.tick_interval_ms);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match station.tick() {
                    StationState::Idle => {}
                    state => debug!("Tick: {:?}", state),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    link_task.abort();
    Ok(())
}
