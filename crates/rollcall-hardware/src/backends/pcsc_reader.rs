//! PC/SC reader backend (pcsc-lite on Linux/macOS, WinSCard on Windows).
//!
//! Contactless readers such as the ACR122U expose NFC tags as smart cards.
//! The UID is fetched with the `GET DATA` pseudo-APDU and Type 2 pages are
//! written with `UPDATE BINARY`. PC/SC calls block, so they run on the
//! blocking pool; `SCardGetStatusChange` enforces the poll timeout itself.

use crate::error::{HardwareError, Result};
use crate::traits::{TYPE2_FIRST_USER_PAGE, TagReader, type2_pages};
use crate::types::{BackendKind, ReaderInfo};
use pcsc::{Context, Protocols, ReaderState, Scope, ShareMode, State};
use rollcall_core::TagUid;
use std::ffi::{CStr, CString};
use std::time::Duration;
use tracing::{debug, trace};

/// `GET DATA` for the card UID.
const APDU_GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Status word for success.
const SW_OK: [u8; 2] = [0x90, 0x00];

/// PC/SC reader selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcscConfig {
    /// Case-insensitive substring a reader name must contain; the first
    /// reader is used when unset.
    pub reader_filter: Option<String>,
}

/// Reader bound through the PC/SC service.
pub struct PcscReader {
    config: PcscConfig,
    context: Option<Context>,
    reader: Option<CString>,
}

impl std::fmt::Debug for PcscReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscReader")
            .field("config", &self.config)
            .field("reader", &self.reader)
            .finish()
    }
}

impl PcscReader {
    pub fn new(config: PcscConfig) -> Self {
        Self {
            config,
            context: None,
            reader: None,
        }
    }

    fn bound(&self) -> Result<(Context, CString)> {
        match (&self.context, &self.reader) {
            (Some(context), Some(reader)) => Ok((context.clone(), reader.clone())),
            _ => Err(HardwareError::disconnected("PC/SC reader not bound")),
        }
    }

    fn forget_on_disconnect<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_disconnect()
        {
            self.context = None;
            self.reader = None;
        }
        result
    }
}

impl TagReader for PcscReader {
    async fn probe(&mut self) -> Result<ReaderInfo> {
        self.context = None;
        self.reader = None;

        let filter = self.config.reader_filter.clone();
        let (context, reader) = tokio::task::spawn_blocking(move || -> Result<_> {
            let context = Context::establish(Scope::User).map_err(|e| {
                HardwareError::initialization_failed(format!("PC/SC service: {e}"))
            })?;
            let readers = context.list_readers_owned().map_err(map_error)?;

            let reader = readers
                .into_iter()
                .find(|name| match &filter {
                    Some(filter) => name
                        .to_string_lossy()
                        .to_lowercase()
                        .contains(&filter.to_lowercase()),
                    None => true,
                })
                .ok_or_else(|| HardwareError::initialization_failed("no matching PC/SC reader"))?;

            Ok((context, reader))
        })
        .await
        .map_err(|e| HardwareError::initialization_failed(e.to_string()))??;

        let name = reader.to_string_lossy().into_owned();
        debug!(reader = %name, "PC/SC reader bound");
        self.context = Some(context);
        self.reader = Some(reader);

        Ok(ReaderInfo::new(name, BackendKind::Pcsc))
    }

    fn is_ready(&self) -> bool {
        self.context.is_some() && self.reader.is_some()
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<TagUid>> {
        let (context, reader) = self.bound()?;

        let result = tokio::task::spawn_blocking(move || -> Result<Option<TagUid>> {
            if !wait_for_card(&context, &reader, timeout)? {
                return Ok(None);
            }
            match read_uid(&context, &reader) {
                Ok(uid) => Ok(Some(uid)),
                // tag left the field between detection and connect
                Err(HardwareError::InvalidData { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| HardwareError::communication(e.to_string()))
        .and_then(|r| r);

        self.forget_on_disconnect(result)
    }

    async fn write(
        &mut self,
        target: Option<&TagUid>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<TagUid> {
        let (context, reader) = self.bound()?;
        let target = target.cloned();
        let pages = type2_pages(payload);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        let result = tokio::task::spawn_blocking(move || -> Result<TagUid> {
            if !wait_for_card(&context, &reader, timeout)? {
                return Err(HardwareError::write_timeout(timeout_ms));
            }

            let card = context
                .connect(&reader, ShareMode::Shared, Protocols::ANY)
                .map_err(map_card_error)?;
            let uid = transmit_uid(&card)?;

            if let Some(expected) = &target
                && expected != &uid
            {
                return Err(HardwareError::write_error(format!(
                    "expected tag {expected}, found {uid}"
                )));
            }

            let mut rx = [0u8; pcsc::MAX_BUFFER_SIZE];
            for (offset, page) in pages.iter().enumerate() {
                let page_no = TYPE2_FIRST_USER_PAGE + offset as u8;
                let mut apdu = vec![0xFF, 0xD6, 0x00, page_no, 0x04];
                apdu.extend_from_slice(page);

                let response = card.transmit(&apdu, &mut rx).map_err(map_card_error)?;
                if response != SW_OK {
                    return Err(HardwareError::write_error(format!(
                        "page {page_no} rejected with {response:02X?}"
                    )));
                }
                trace!(page = page_no, "page written");
            }

            Ok(uid)
        })
        .await
        .map_err(|e| HardwareError::communication(e.to_string()))
        .and_then(|r| r);

        self.forget_on_disconnect(result)
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Pcsc
    }
}

/// Block until a card is present or `timeout` elapses.
fn wait_for_card(context: &Context, reader: &CStr, timeout: Duration) -> Result<bool> {
    let mut states = [ReaderState::new(reader, State::UNAWARE)];
    context
        .get_status_change(Duration::ZERO, &mut states)
        .map_err(map_error)?;

    if states[0].event_state().contains(State::PRESENT) {
        return Ok(true);
    }

    states[0].sync_current_state();
    match context.get_status_change(timeout, &mut states) {
        Ok(()) => Ok(states[0].event_state().contains(State::PRESENT)),
        Err(pcsc::Error::Timeout) => Ok(false),
        Err(e) => Err(map_error(e)),
    }
}

fn read_uid(context: &Context, reader: &CStr) -> Result<TagUid> {
    let card = context
        .connect(reader, ShareMode::Shared, Protocols::ANY)
        .map_err(map_card_error)?;
    transmit_uid(&card)
}

fn transmit_uid(card: &pcsc::Card) -> Result<TagUid> {
    let mut rx = [0u8; pcsc::MAX_BUFFER_SIZE];
    let response = card.transmit(&APDU_GET_UID, &mut rx).map_err(map_card_error)?;

    match response {
        [uid @ .., 0x90, 0x00] if !uid.is_empty() => {
            TagUid::from_bytes(uid).map_err(|e| HardwareError::invalid_data(e.to_string()))
        }
        other => Err(HardwareError::invalid_data(format!(
            "GET UID failed: {other:02X?}"
        ))),
    }
}

/// Reader-level failures.
fn map_error(error: pcsc::Error) -> HardwareError {
    match error {
        pcsc::Error::Timeout => HardwareError::timeout(0),
        pcsc::Error::NoReadersAvailable
        | pcsc::Error::ReaderUnavailable
        | pcsc::Error::UnknownReader
        | pcsc::Error::NoService
        | pcsc::Error::ServiceStopped
        | pcsc::Error::InvalidHandle => HardwareError::disconnected(error.to_string()),
        other => HardwareError::communication(other.to_string()),
    }
}

/// Card-level failures: a tag leaving the field is not a reader failure.
fn map_card_error(error: pcsc::Error) -> HardwareError {
    match error {
        pcsc::Error::NoSmartcard
        | pcsc::Error::RemovedCard
        | pcsc::Error::ResetCard
        | pcsc::Error::UnresponsiveCard
        | pcsc::Error::UnpoweredCard => {
            HardwareError::invalid_data(format!("tag left the field: {error}"))
        }
        other => map_error(other),
    }
}
