//! PN532 reader on a serial port (HSU mode).
//!
//! The serial driver is blocking, so every transaction runs on Tokio's
//! blocking pool with the port moved in and handed back afterwards. Each
//! transaction is bounded by a deadline enforced through the port read
//! timeout, which lets an in-flight write finish instead of being cut off.

use super::pn532_frame::{self, Frame, command};
use crate::error::{HardwareError, Result};
use crate::traits::{TYPE2_FIRST_USER_PAGE, TagReader, type2_pages};
use crate::types::{BackendKind, ReaderInfo};
use bytes::BytesMut;
use rollcall_core::TagUid;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Read granularity while waiting for a frame.
const READ_SLICE: Duration = Duration::from_millis(50);

/// Budget for a single command/response exchange.
const COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between two empty passive-target scans.
const SCAN_PAUSE: Duration = Duration::from_millis(100);

/// MIFARE Ultralight / NTAG WRITE command.
const TYPE2_WRITE: u8 = 0xA2;

/// Serial port settings for a PN532 board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pn532Config {
    /// Port path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: String,

    /// Baud rate; PN532 HSU defaults to 115200.
    pub baud_rate: u32,
}

impl Default for Pn532Config {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: 115_200,
        }
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) { "COM3" } else { "/dev/ttyUSB0" }
}

/// PN532 reader driven over a serial port.
pub struct Pn532Reader {
    config: Pn532Config,
    port: Option<Box<dyn SerialPort>>,
    ready: bool,
}

impl std::fmt::Debug for Pn532Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pn532Reader")
            .field("config", &self.config)
            .field("open", &self.port.is_some())
            .field("ready", &self.ready)
            .finish()
    }
}

impl Pn532Reader {
    pub fn new(config: Pn532Config) -> Self {
        Self {
            config,
            port: None,
            ready: false,
        }
    }

    /// Run `op` on the blocking pool with the port moved in.
    ///
    /// The port is dropped (and the reader marked unready) when the
    /// operation reports a disconnect.
    async fn with_port<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> Result<T> + Send + 'static,
    {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| HardwareError::disconnected(self.config.port.clone()))?;

        let joined = tokio::task::spawn_blocking(move || {
            let result = op(port.as_mut());
            (port, result)
        })
        .await;

        match joined {
            Ok((port, result)) => {
                match &result {
                    Err(e) if e.is_disconnect() => {
                        warn!(port = %self.config.port, error = %e, "PN532 link lost");
                        self.ready = false;
                    }
                    _ => self.port = Some(port),
                }
                result
            }
            Err(e) => {
                self.ready = false;
                Err(HardwareError::communication(format!(
                    "serial worker failed: {e}"
                )))
            }
        }
    }
}

impl TagReader for Pn532Reader {
    async fn probe(&mut self) -> Result<ReaderInfo> {
        self.port = None;
        self.ready = false;

        let config = self.config.clone();
        let (port, firmware) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut port = serialport::new(&config.port, config.baud_rate)
                .timeout(READ_SLICE)
                .open()
                .map_err(|e| {
                    HardwareError::initialization_failed(format!("{}: {e}", config.port))
                })?;

            port.write_all(&pn532_frame::WAKEUP)?;
            // normal mode, no IRQ pin
            transact(port.as_mut(), command::SAM_CONFIGURATION, &[0x01, 0x14, 0x01])?;
            // MxRtyPassiveActivation: bounded retries so InListPassiveTarget returns
            transact(
                port.as_mut(),
                command::RF_CONFIGURATION,
                &[0x05, 0xFF, 0x01, 0x02],
            )?;
            let data = transact(port.as_mut(), command::GET_FIRMWARE_VERSION, &[])?;
            let firmware = pn532_frame::parse_firmware(&data)
                .ok_or_else(|| HardwareError::invalid_data("short firmware response"))?;
            Ok((port, firmware))
        })
        .await
        .map_err(|e| HardwareError::initialization_failed(e.to_string()))??;

        debug!(port = %self.config.port, %firmware, "PN532 ready");
        self.port = Some(port);
        self.ready = true;

        Ok(ReaderInfo::new(
            format!("PN532 on {}", self.config.port),
            BackendKind::Pn532Serial,
        )
        .with_firmware_version(firmware))
    }

    fn is_ready(&self) -> bool {
        self.ready && self.port.is_some()
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<TagUid>> {
        let uid = self
            .with_port(move |port| scan_for_target(port, Instant::now() + timeout))
            .await?;
        uid.map(|bytes| TagUid::from_bytes(&bytes))
            .transpose()
            .map_err(|e| HardwareError::invalid_data(e.to_string()))
    }

    async fn write(
        &mut self,
        target: Option<&TagUid>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<TagUid> {
        let target = target.cloned();
        let pages = type2_pages(payload);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        self.with_port(move |port| {
            let deadline = Instant::now() + timeout;
            let bytes = scan_for_target(port, deadline)?
                .ok_or_else(|| HardwareError::write_timeout(timeout_ms))?;
            let uid = TagUid::from_bytes(&bytes)
                .map_err(|e| HardwareError::invalid_data(e.to_string()))?;

            if let Some(expected) = &target
                && expected != &uid
            {
                return Err(HardwareError::write_error(format!(
                    "expected tag {expected}, found {uid}"
                )));
            }

            for (offset, page) in pages.iter().enumerate() {
                let page_no = TYPE2_FIRST_USER_PAGE + offset as u8;
                let mut params = vec![0x01, TYPE2_WRITE, page_no];
                params.extend_from_slice(page);
                let status = transact(port, command::IN_DATA_EXCHANGE, &params)?;
                if status.first() != Some(&0x00) {
                    return Err(HardwareError::write_error(format!(
                        "page {page_no} rejected with status {:02X?}",
                        status.first()
                    )));
                }
            }

            let _ = transact(port, command::IN_RELEASE, &[0x00]);
            Ok(uid)
        })
        .await
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Pn532Serial
    }
}

/// Repeat passive-target scans until a tag answers or `deadline` passes.
fn scan_for_target(port: &mut dyn SerialPort, deadline: Instant) -> Result<Option<Vec<u8>>> {
    loop {
        let data = transact(port, command::IN_LIST_PASSIVE_TARGET, &[0x01, 0x00])?;
        if let Some(uid) = pn532_frame::parse_passive_target(&data) {
            trace!(uid = ?uid, "PN532 target found");
            return Ok(Some(uid));
        }
        if Instant::now() + SCAN_PAUSE >= deadline {
            return Ok(None);
        }
        std::thread::sleep(SCAN_PAUSE);
    }
}

/// Send one command and wait for its ACK and response.
fn transact(port: &mut dyn SerialPort, cmd: u8, params: &[u8]) -> Result<Vec<u8>> {
    port.write_all(&pn532_frame::encode(cmd, params))?;
    port.flush()?;

    let deadline = Instant::now() + COMMAND_TIMEOUT;
    let mut buf = BytesMut::with_capacity(64);
    let mut acked = false;
    let mut chunk = [0u8; 64];

    loop {
        while let Some(frame) = pn532_frame::decode(&mut buf)? {
            match frame {
                Frame::Ack => acked = true,
                Frame::Nack => {
                    return Err(HardwareError::communication("PN532 rejected frame"));
                }
                Frame::Error => {
                    return Err(HardwareError::communication("PN532 application error"));
                }
                Frame::Response { command, data } if acked && command == cmd + 1 => {
                    return Ok(data);
                }
                Frame::Response { command, .. } => {
                    trace!(command, "ignoring unexpected PN532 response");
                }
            }
        }

        if Instant::now() >= deadline {
            let millis = u64::try_from(COMMAND_TIMEOUT.as_millis()).unwrap_or(u64::MAX);
            return Err(HardwareError::timeout(millis));
        }

        match port.read(&mut chunk) {
            Ok(0) => {
                return Err(HardwareError::disconnected("serial port closed"));
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Pn532Config::default();
        assert_eq!(config.baud_rate, 115_200);
        assert!(!config.port.is_empty());
    }

    #[tokio::test]
    async fn test_unopened_reader_is_not_ready() {
        let mut reader = Pn532Reader::new(Pn532Config::default());
        assert!(!reader.is_ready());
        let err = reader.poll(Duration::from_millis(10)).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_probe_missing_port_fails() {
        let mut reader = Pn532Reader::new(Pn532Config {
            port: "/dev/rollcall-does-not-exist".to_string(),
            baud_rate: 115_200,
        });
        let err = reader.probe().await.unwrap_err();
        assert!(matches!(err, HardwareError::InitializationFailed { .. }));
        assert!(!reader.is_ready());
    }
}
