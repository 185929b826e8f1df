//! PN532 host-interface frame codec.
//!
//! Frames exchanged with a PN532 over HSU (UART) have the layout
//!
//! ```text
//! 00 00 FF LEN LCS TFI CMD DATA... DCS 00
//! ```
//!
//! where `LEN` counts `TFI`, `CMD` and `DATA`, `LCS` makes `LEN + LCS == 0`
//! and `DCS` makes `TFI + CMD + DATA + DCS == 0` (mod 256). The chip
//! acknowledges every command with the fixed [`ACK`] frame before sending
//! its response.

use crate::error::{HardwareError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Acknowledge frame sent by the PN532 after each command.
pub const ACK: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// Wake-up preamble for HSU mode.
pub const WAKEUP: [u8; 16] = [
    0x55, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const HOST_TO_PN532: u8 = 0xD4;
const PN532_TO_HOST: u8 = 0xD5;
const ERROR_FRAME_TFI: u8 = 0x7F;

/// Command codes used by the serial backend.
pub mod command {
    pub const GET_FIRMWARE_VERSION: u8 = 0x02;
    pub const SAM_CONFIGURATION: u8 = 0x14;
    pub const RF_CONFIGURATION: u8 = 0x32;
    pub const IN_DATA_EXCHANGE: u8 = 0x40;
    pub const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;
    pub const IN_RELEASE: u8 = 0x52;
}

/// One frame decoded from the PN532.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ack,
    Nack,
    /// Application-level error frame.
    Error,
    Response { command: u8, data: Vec<u8> },
}

/// Encode a host command frame.
pub fn encode(command: u8, params: &[u8]) -> Bytes {
    let len = (params.len() + 2) as u8;
    let mut buf = BytesMut::with_capacity(params.len() + 9);
    buf.put_slice(&[0x00, 0x00, 0xFF]);
    buf.put_u8(len);
    buf.put_u8(len.wrapping_neg());
    buf.put_u8(HOST_TO_PN532);
    buf.put_u8(command);
    buf.put_slice(params);

    let sum = params
        .iter()
        .fold(HOST_TO_PN532.wrapping_add(command), |acc, b| {
            acc.wrapping_add(*b)
        });
    buf.put_u8(sum.wrapping_neg());
    buf.put_u8(0x00);
    buf.freeze()
}

/// Decode the next frame from `buf`, consuming it.
///
/// Leading garbage is discarded. Returns `Ok(None)` when more bytes are
/// needed.
///
/// # Errors
///
/// Returns `InvalidData` when a complete frame fails its data checksum.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>> {
    loop {
        let Some(start) = buf.windows(2).position(|w| w == [0x00, 0xFF]) else {
            // keep a trailing 0x00, it may begin the next start code
            let keep = usize::from(buf.last() == Some(&0x00));
            let drop = buf.len() - keep;
            buf.advance(drop);
            return Ok(None);
        };
        buf.advance(start);

        if buf.len() < 4 {
            return Ok(None);
        }

        let len = buf[2];
        let lcs = buf[3];

        if len == 0x00 && lcs == 0xFF {
            buf.advance(4);
            return Ok(Some(Frame::Ack));
        }
        if len == 0xFF && lcs == 0x00 {
            buf.advance(4);
            return Ok(Some(Frame::Nack));
        }
        if len.wrapping_add(lcs) != 0 {
            // not a frame header, resync after the start code
            buf.advance(2);
            continue;
        }

        let len = len as usize;
        let total = 4 + len + 1;
        if buf.len() < total {
            return Ok(None);
        }

        let body = buf[4..4 + len].to_vec();
        let dcs = buf[4 + len];
        buf.advance(total);

        let sum = body.iter().fold(dcs, |acc, b| acc.wrapping_add(*b));
        if sum != 0 {
            return Err(HardwareError::invalid_data("PN532 frame checksum mismatch"));
        }

        return match body.as_slice() {
            [ERROR_FRAME_TFI, ..] => Ok(Some(Frame::Error)),
            [PN532_TO_HOST, command, data @ ..] => Ok(Some(Frame::Response {
                command: *command,
                data: data.to_vec(),
            })),
            _ => Err(HardwareError::invalid_data(
                "PN532 frame with unexpected direction byte",
            )),
        };
    }
}

/// Extract the UID of the first target from an `InListPassiveTarget`
/// response (ISO 14443A, 106 kbps).
pub fn parse_passive_target(data: &[u8]) -> Option<Vec<u8>> {
    let count = *data.first()?;
    if count == 0 {
        return None;
    }
    // Tg, SENS_RES (2), SEL_RES, NFCIDLength, NFCID
    let uid_len = *data.get(5)? as usize;
    data.get(6..6 + uid_len).map(<[u8]>::to_vec)
}

/// Render a `GetFirmwareVersion` response as `PN5xx vV.R`.
pub fn parse_firmware(data: &[u8]) -> Option<String> {
    match data {
        [ic, ver, rev, ..] => Some(format!("PN5{ic:02x} v{ver}.{rev}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_firmware_request() {
        let frame = encode(command::GET_FIRMWARE_VERSION, &[]);
        assert_eq!(
            frame.as_ref(),
            &[0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x02, 0x2A, 0x00]
        );
    }

    #[test]
    fn test_encode_sam_configuration() {
        let frame = encode(command::SAM_CONFIGURATION, &[0x01, 0x14, 0x01]);
        assert_eq!(
            frame.as_ref(),
            &[0x00, 0x00, 0xFF, 0x05, 0xFB, 0xD4, 0x14, 0x01, 0x14, 0x01, 0x02, 0x00]
        );
    }

    #[test]
    fn test_decode_ack_then_response() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&ACK);
        // firmware response: D5 03 32 01 06 07
        buf.extend_from_slice(&[
            0x00, 0x00, 0xFF, 0x06, 0xFA, 0xD5, 0x03, 0x32, 0x01, 0x06, 0x07, 0xE8, 0x00,
        ]);

        assert_eq!(decode(&mut buf).unwrap(), Some(Frame::Ack));
        let frame = decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Response {
                command: 0x03,
                data: vec![0x32, 0x01, 0x06, 0x07]
            }
        );
        assert_eq!(parse_firmware(&[0x32, 0x01, 0x06, 0x07]).unwrap(), "PN532 v1.6");
    }

    #[test]
    fn test_decode_partial_frame_waits() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0xFF, 0x06, 0xFA, 0xD5][..]);
        assert_eq!(decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 5, "leading preamble byte dropped, header kept");
    }

    #[test]
    fn test_decode_skips_garbage() {
        let mut buf = BytesMut::from(&[0x55, 0x13, 0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00][..]);
        assert_eq!(decode(&mut buf).unwrap(), Some(Frame::Ack));
    }

    #[test]
    fn test_decode_bad_checksum() {
        let mut buf =
            BytesMut::from(&[0x00, 0x00, 0xFF, 0x03, 0xFD, 0xD5, 0x41, 0x00, 0x00, 0x00][..]);
        assert!(decode(&mut buf).is_err());
    }

    #[test]
    fn test_parse_passive_target() {
        // NbTg=1, Tg=1, SENS_RES=00 44, SEL_RES=00, len=7, uid
        let data = [
            0x01, 0x01, 0x00, 0x44, 0x00, 0x07, 0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80,
        ];
        assert_eq!(
            parse_passive_target(&data).unwrap(),
            vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80]
        );
        assert_eq!(parse_passive_target(&[0x00]), None);
    }
}
