//! Frame codec for GDL-90 messages
//!
//! Handles the CRC and byte-stuffed framing shared by every message type.
//! Framing order is fixed by the protocol: the CRC is computed over the raw
//! payload and appended low byte first, then the combined sequence is
//! escaped, then wrapped in flag bytes. The flag bytes themselves are never
//! escaped.

use thiserror::Error;

use super::{CONTROL_ESCAPE, ESCAPE_XOR, FLAG_BYTE};

/// Codec errors (decode direction only; encoding is total)
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame missing 0x7E delimiters")]
    MissingDelimiter,

    #[error("Escape byte at end of frame")]
    TruncatedEscape,

    #[error("Frame too short to hold a CRC")]
    TooShort,

    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch { expected: u16, actual: u16 },
}

/// CRC-16/CCITT lookup table, polynomial 0x1021, init 0x0000
const CRC16_TABLE: [u16; 256] = build_crc16_table();

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-16/CCITT checksum of a payload.
///
/// Pure function of the bytes; the empty payload checksums to 0x0000.
pub fn checksum(payload: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in payload {
        crc = CRC16_TABLE[(crc >> 8) as usize] ^ (crc << 8) ^ byte as u16;
    }
    crc
}

/// Frame a payload: append CRC (low byte first), escape, add flag bytes.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let crc = checksum(payload);

    // Worst case every byte needs escaping, plus two flags and the CRC.
    let mut out = Vec::with_capacity(payload.len() * 2 + 6);
    out.push(FLAG_BYTE);

    let crc_bytes = [(crc & 0x00FF) as u8, (crc >> 8) as u8];
    for &byte in payload.iter().chain(crc_bytes.iter()) {
        if byte == FLAG_BYTE || byte == CONTROL_ESCAPE {
            out.push(CONTROL_ESCAPE);
            out.push(byte ^ ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }

    out.push(FLAG_BYTE);
    out
}

/// Reverse of [`frame`]: strip delimiters, un-escape, verify and strip
/// the CRC. Used by tests; the bridge only transmits.
pub fn deframe(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < 2 || data[0] != FLAG_BYTE || data[data.len() - 1] != FLAG_BYTE {
        return Err(CodecError::MissingDelimiter);
    }

    let inner = &data[1..data.len() - 1];
    let mut unescaped = Vec::with_capacity(inner.len());
    let mut iter = inner.iter();
    while let Some(&byte) = iter.next() {
        if byte == CONTROL_ESCAPE {
            let &next = iter.next().ok_or(CodecError::TruncatedEscape)?;
            unescaped.push(next ^ ESCAPE_XOR);
        } else {
            unescaped.push(byte);
        }
    }

    if unescaped.len() < 2 {
        return Err(CodecError::TooShort);
    }

    let crc_lo = unescaped[unescaped.len() - 2];
    let crc_hi = unescaped[unescaped.len() - 1];
    let received = u16::from(crc_hi) << 8 | u16::from(crc_lo);
    unescaped.truncate(unescaped.len() - 2);

    let computed = checksum(&unescaped);
    if computed != received {
        return Err(CodecError::CrcMismatch {
            expected: computed,
            actual: received,
        });
    }

    Ok(unescaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_table_golden_entries() {
        // Spot-check against the published CCITT table.
        assert_eq!(CRC16_TABLE[0], 0x0000);
        assert_eq!(CRC16_TABLE[1], 0x1021);
        assert_eq!(CRC16_TABLE[8], 0x8108);
        assert_eq!(CRC16_TABLE[255], 0x1ef0);
    }

    #[test]
    fn test_checksum_empty_is_zero() {
        assert_eq!(checksum(&[]), 0x0000);
    }

    #[test]
    fn test_checksum_deterministic() {
        let payload = [0x0A, 0x00, 0xAB, 0xCD, 0xEF];
        assert_eq!(checksum(&payload), checksum(&payload));
    }

    #[test]
    fn test_frame_delimiters_and_roundtrip() {
        let payload = [0x00, 0x81, 0x01, 0x00, 0x00, 0x00, 0x00];
        let framed = frame(&payload);

        assert_eq!(framed[0], FLAG_BYTE);
        assert_eq!(*framed.last().unwrap(), FLAG_BYTE);
        // No unescaped flag bytes inside the frame body.
        assert!(!framed[1..framed.len() - 1].contains(&FLAG_BYTE));

        assert_eq!(deframe(&framed).unwrap(), payload);
    }

    #[test]
    fn test_frame_escapes_reserved_bytes() {
        let payload = [0x7E, 0x7D, 0x42, 0x7E];
        let framed = frame(&payload);

        assert!(!framed[1..framed.len() - 1].contains(&FLAG_BYTE));
        assert_eq!(deframe(&framed).unwrap(), payload);
    }

    #[test]
    fn test_crc_bytes_are_escaped_too() {
        // Search for a payload whose CRC contains a reserved byte, then
        // verify it still round-trips.
        let mut found = false;
        for b in 0u8..=255 {
            let payload = [b, b.wrapping_add(1)];
            let crc = checksum(&payload);
            let lo = (crc & 0xFF) as u8;
            let hi = (crc >> 8) as u8;
            if lo == 0x7E || lo == 0x7D || hi == 0x7E || hi == 0x7D {
                let framed = frame(&payload);
                assert!(!framed[1..framed.len() - 1].contains(&FLAG_BYTE));
                assert_eq!(deframe(&framed).unwrap(), payload);
                found = true;
                break;
            }
        }
        assert!(found, "no payload with a reserved CRC byte in range");
    }

    #[test]
    fn test_deframe_rejects_bad_crc() {
        let payload = [0x01, 0x02, 0x03];
        let mut framed = frame(&payload);
        framed[2] ^= 0x01;
        assert!(matches!(
            deframe(&framed),
            Err(CodecError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_deframe_rejects_missing_delimiters() {
        assert!(matches!(
            deframe(&[0x01, 0x02]),
            Err(CodecError::MissingDelimiter)
        ));
    }
}
