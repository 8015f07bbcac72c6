//! # Serial Communication Module
//!
//! Handles the serial link to the roof unit.
//!
//! This module handles:
//! - Opening the configured port, then the usual USB serial paths
//! - Splitting the incoming byte stream into lines
//! - Routing message lines and telemetry lines to their mailbox slots
//! - Writing catch-up request lines back to the roof unit

use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{Result, StationError};
use crate::record::protocol::MESSAGE_MARKER;
use crate::station::{Mailbox, PayloadKind, RequestSink};

/// Device paths tried after the configured one
const FALLBACK_DEVICE_PATHS: &[&str] = &["/dev/ttyUSB0", "/dev/ttyACM0"];

/// Longest line kept while waiting for its terminator
pub const MAX_LINE_LEN: usize = 1024;

/// Line-oriented link to the roof unit
pub struct StationLink<T> {
    port: T,
    device_path: String,
    buffer: BytesMut,
    mailbox: Arc<Mailbox>,
}

impl<T> std::fmt::Debug for StationLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationLink")
            .field("device_path", &self.device_path)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl StationLink<tokio_serial::SerialStream> {
    /// Open the configured port, falling back to the common USB paths
    ///
    /// # Errors
    ///
    /// Returns [`StationError::SerialPortNotFound`] if no path can be opened
    pub fn open(config: &SerialConfig, mailbox: Arc<Mailbox>) -> Result<Self> {
        let mut paths = vec![config.port.as_str()];
        paths.extend(FALLBACK_DEVICE_PATHS.iter().copied().filter(|p| *p != config.port));
        Self::open_with_paths(&paths, config.baud_rate, mailbox)
    }

    /// Open the first path in `paths` that succeeds
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, mailbox: Arc<Mailbox>) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened roof link at {} ({} baud)", path, baud_rate);
                    return Ok(Self::new(port, *path, mailbox));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(StationError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port, 8N1 without flow control
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| StationError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> StationLink<T> {
    /// Wrap an already opened byte stream
    pub fn new(port: T, device_path: impl Into<String>, mailbox: Arc<Mailbox>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
            buffer: BytesMut::with_capacity(MAX_LINE_LEN),
            mailbox,
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Route every complete line in the buffer; returns how many were routed
    fn drain_lines(&mut self) -> usize {
        let mut routed = 0;
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(end + 1);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            let kind = if line.starts_with(MESSAGE_MARKER) {
                PayloadKind::Message
            } else {
                PayloadKind::Telemetry
            };
            debug!("Received {:?} line: {}", kind, line);
            self.mailbox.submit(kind, line);
            routed += 1;
        }

        if self.buffer.len() > MAX_LINE_LEN {
            warn!("Discarding {} bytes without line terminator", self.buffer.len());
            self.buffer.clear();
        }
        routed
    }

    /// Read whatever is available and route complete lines
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Serial`] on a read failure or end of stream
    pub async fn read_lines(&mut self) -> Result<usize> {
        let n = self
            .port
            .read_buf(&mut self.buffer)
            .await
            .map_err(|e| {
                StationError::Serial(format!("Failed to read from {}: {}", self.device_path, e))
            })?;

        if n == 0 {
            return Err(StationError::Serial(format!("{} closed", self.device_path)));
        }
        Ok(self.drain_lines())
    }

    /// Write one request line followed by a newline
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');

        self.port
            .write_all(&frame)
            .await
            .map_err(|e| StationError::Serial(format!("Failed to write request: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| StationError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent request line: {}", line);
        Ok(())
    }

    /// Pump the link until it fails
    ///
    /// Incoming lines go to the mailbox; lines from `requests` are written
    /// out. Returns when the port fails or the request channel closes.
    pub async fn run(&mut self, requests: &mut UnboundedReceiver<String>) -> Result<()> {
        loop {
            tokio::select! {
                read = self.read_lines() => {
                    read?;
                }
                request = requests.recv() => {
                    match request {
                        Some(line) => self.send_line(&line).await?,
                        None => {
                            info!("Request channel closed, stopping link");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// [`RequestSink`] feeding the link task through a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl RequestSink for ChannelSink {
    fn publish(&mut self, line: &str) -> Result<()> {
        self.tx
            .send(line.to_string())
            .map_err(|_| StationError::Serial("Request channel closed".to_string()))
    }
}
