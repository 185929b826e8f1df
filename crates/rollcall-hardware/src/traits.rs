//! Reader trait definition.
//!
//! [`TagReader`] is the single capability interface every backend
//! implements. Callers never talk to a concrete backend: the selector binds
//! one at startup and the [`ReaderPort`](crate::port::ReaderPort) drives it.
//!
//! All methods use native `async fn` (Edition 2024 RPITIT), so the trait is
//! not object-safe; dynamic selection goes through the
//! [`AnyTagReader`](crate::devices::AnyTagReader) enum instead of
//! `Box<dyn TagReader>`.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{BackendKind, ReaderInfo};
use rollcall_core::TagUid;
use std::time::Duration;

/// NFC reader abstraction.
///
/// Readers are owned by a single port and only need to be `Send`; driver
/// handles such as serial ports are not `Sync`.
///
/// # Timeouts
///
/// Every hardware call is bounded by the `timeout` argument. Drivers that
/// block (PC/SC, serial) enforce it inside the driver call so an in-flight
/// transaction always finishes or fails on its own; it is never aborted
/// halfway through a tag write.
///
/// # Examples
///
/// ```no_run
/// use rollcall_hardware::traits::TagReader;
/// use rollcall_hardware::error::Result;
/// use std::time::Duration;
///
/// async fn wait_for_tag<R: TagReader>(reader: &mut R) -> Result<Option<String>> {
///     let uid = reader.poll(Duration::from_secs(3)).await?;
///     Ok(uid.map(|uid| uid.to_string()))
/// }
/// ```
pub trait TagReader: Send {
    /// Open (or reopen) the underlying driver and verify the reader answers.
    ///
    /// Used by the selector at startup and as the lightweight reconnect
    /// probe while the port is disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver or the reader is unavailable.
    async fn probe(&mut self) -> Result<ReaderInfo>;

    /// Whether the last probe succeeded and no disconnect was seen since.
    fn is_ready(&self) -> bool;

    /// Wait up to `timeout` for a tag and return its UID.
    ///
    /// Returns `Ok(None)` when no tag was presented in time.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is disconnected or the driver fails.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<TagUid>>;

    /// Write `payload` to the tag on the reader and return its UID.
    ///
    /// When `target` is given, the write is refused unless the tag on the
    /// reader has that UID. Waits up to `timeout` for a tag to appear.
    ///
    /// # Errors
    ///
    /// Returns an error if no tag shows up in time, the wrong tag is
    /// present, or the tag rejects the write.
    async fn write(
        &mut self,
        target: Option<&TagUid>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<TagUid>;

    /// Backend family of this reader.
    fn backend(&self) -> BackendKind;
}

/// Split an NDEF message into 4-byte NFC Forum Type 2 pages.
///
/// The final page is zero-padded.
pub(crate) fn type2_pages(payload: &[u8]) -> Vec<[u8; 4]> {
    payload
        .chunks(4)
        .map(|chunk| {
            let mut page = [0u8; 4];
            page[..chunk.len()].copy_from_slice(chunk);
            page
        })
        .collect()
}

/// First user-memory page on NFC Forum Type 2 tags (NTAG21x, Ultralight).
pub(crate) const TYPE2_FIRST_USER_PAGE: u8 = 4;
