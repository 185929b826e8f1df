//! NDEF text payloads written to guest tags.
//!
//! A guest tag carries a single NFC Forum well-known text record holding the
//! guest id, wrapped in an NDEF message TLV so phones can read it too.
//!
//! ```
//! use rollcall_hardware::ndef;
//!
//! let bytes = ndef::text_message("1001").unwrap();
//! assert_eq!(ndef::parse_text_message(&bytes).as_deref(), Some("1001"));
//! ```

use crate::error::{HardwareError, Result};

const TLV_NDEF_MESSAGE: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;
/// MB | ME | SR | TNF=well-known
const RECORD_HEADER_SHORT_TEXT: u8 = 0xD1;
const RECORD_TYPE_TEXT: u8 = b'T';
const LANGUAGE: &[u8] = b"en";

/// Largest text that still fits a short record.
pub const MAX_TEXT_LEN: usize = 255 - 1 - LANGUAGE.len();

/// Encode `text` as a TLV-wrapped NDEF message with one text record.
///
/// # Errors
///
/// Returns `InvalidData` if the text does not fit a short record.
pub fn text_message(text: &str) -> Result<Vec<u8>> {
    let text = text.as_bytes();
    if text.len() > MAX_TEXT_LEN {
        return Err(HardwareError::invalid_data(format!(
            "tag text limited to {MAX_TEXT_LEN} bytes, got {}",
            text.len()
        )));
    }

    let payload_len = 1 + LANGUAGE.len() + text.len();
    let mut record = Vec::with_capacity(4 + payload_len);
    record.push(RECORD_HEADER_SHORT_TEXT);
    record.push(1); // type length
    record.push(payload_len as u8);
    record.push(RECORD_TYPE_TEXT);
    record.push(LANGUAGE.len() as u8); // status byte: UTF-8, language length
    record.extend_from_slice(LANGUAGE);
    record.extend_from_slice(text);

    Ok(wrap_tlv(&record))
}

/// Encode an empty NDEF message, used when erasing a tag.
pub fn empty_message() -> Vec<u8> {
    wrap_tlv(&[])
}

fn wrap_tlv(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 5);
    out.push(TLV_NDEF_MESSAGE);
    if message.len() < 0xFF {
        out.push(message.len() as u8);
    } else {
        out.push(0xFF);
        out.extend_from_slice(&(message.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(message);
    out.push(TLV_TERMINATOR);
    out
}

/// Extract the text of the first text record in a TLV area.
///
/// Returns `None` for empty messages or anything that is not a short text
/// record.
pub fn parse_text_message(bytes: &[u8]) -> Option<String> {
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x00 => i += 1, // NULL TLV
            TLV_TERMINATOR => return None,
            tag => {
                let (len, header) = match *bytes.get(i + 1)? {
                    0xFF => {
                        let hi = *bytes.get(i + 2)? as usize;
                        let lo = *bytes.get(i + 3)? as usize;
                        ((hi << 8) | lo, 4)
                    }
                    short => (short as usize, 2),
                };
                let body = bytes.get(i + header..i + header + len)?;
                if tag == TLV_NDEF_MESSAGE {
                    return parse_text_record(body);
                }
                i += header + len;
            }
        }
    }
    None
}

fn parse_text_record(record: &[u8]) -> Option<String> {
    let header = *record.first()?;
    // short record, well-known TNF
    if header & 0x10 == 0 || header & 0x07 != 0x01 {
        return None;
    }
    let type_len = *record.get(1)? as usize;
    let payload_len = *record.get(2)? as usize;
    let id_len = if header & 0x08 != 0 { 1 } else { 0 };
    let type_start = 3 + id_len;
    if record.get(type_start..type_start + type_len)? != [RECORD_TYPE_TEXT] {
        return None;
    }
    let id_skip = if id_len == 1 {
        *record.get(3)? as usize
    } else {
        0
    };
    let payload_start = type_start + type_len + id_skip;
    let payload = record.get(payload_start..payload_start + payload_len)?;
    let lang_len = (*payload.first()? & 0x3F) as usize;
    let text = payload.get(1 + lang_len..)?;
    String::from_utf8(text.to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_layout() {
        let bytes = text_message("1001").unwrap();
        assert_eq!(
            bytes,
            vec![
                0x03, 0x0B, 0xD1, 0x01, 0x07, b'T', 0x02, b'e', b'n', b'1', b'0', b'0', b'1',
                0xFE
            ]
        );
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(empty_message(), vec![0x03, 0x00, 0xFE]);
        assert_eq!(parse_text_message(&empty_message()), None);
    }

    #[test]
    fn test_text_too_long() {
        let text = "x".repeat(MAX_TEXT_LEN + 1);
        assert!(text_message(&text).is_err());
        assert!(text_message(&"x".repeat(MAX_TEXT_LEN)).is_ok());
    }

    #[test]
    fn test_parse_skips_null_and_lock_tlvs() {
        let mut bytes = vec![0x00, 0x01, 0x03, 0xA0, 0x0C, 0x44];
        bytes.extend(text_message("G-17").unwrap());
        assert_eq!(parse_text_message(&bytes).as_deref(), Some("G-17"));
    }

    #[test]
    fn test_parse_truncated_returns_none() {
        let bytes = text_message("1001").unwrap();
        assert_eq!(parse_text_message(&bytes[..6]), None);
    }
}
