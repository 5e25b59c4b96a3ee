//! Per-packet length separator codec.
//!
//! Each packet inside a bundle is preceded by a 1- or 2-byte separator
//! carrying its length. Bit 7 (MBB) of byte 0 is always 0 on the wire and
//! doubles as a demux-time sanity check. Bit 6 (PFF) selects the form:
//! 0 = one byte with the length in the low six bits, 1 = two bytes with
//! the high six bits of the length in byte 0 and the low eight in byte 1.

use crate::constants::{LONG_FORM_MAX, MBB, PFF, SHORT_FORM_MAX};
use crate::error::SeparatorError;

/// An encoded separator: one or two bytes, ready to prepend to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separator {
    bytes: [u8; 2],
    len: u8,
}

impl Separator {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl AsRef<[u8]> for Separator {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// A decoded separator: the payload length it declares and how many bytes
/// of the input it occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub len: usize,
    pub consumed: usize,
}

/// Number of separator bytes a payload of `payload_len` bytes needs.
pub const fn encoded_len(payload_len: usize) -> usize {
    if payload_len <= SHORT_FORM_MAX { 1 } else { 2 }
}

/// Encode the separator for a payload of `len` bytes.
pub fn encode(len: usize) -> Result<Separator, SeparatorError> {
    if len <= SHORT_FORM_MAX {
        Ok(Separator {
            bytes: [len as u8, 0],
            len: 1,
        })
    } else if len <= LONG_FORM_MAX {
        Ok(Separator {
            bytes: [PFF | ((len >> 8) as u8 & 0x3F), (len & 0xFF) as u8],
            len: 2,
        })
    } else {
        Err(SeparatorError::TooLong(len))
    }
}

/// Decode a separator from the front of `buf`.
///
/// Byte arithmetic is unsigned throughout, so long-form lengths with the
/// high bit set in the second byte decode correctly.
pub fn decode(buf: &[u8]) -> Result<Decoded, SeparatorError> {
    let b0 = match buf.first() {
        Some(&b) => b,
        None => return Err(SeparatorError::Truncated),
    };
    if b0 & MBB != 0 {
        return Err(SeparatorError::BadSeparator(b0));
    }
    if b0 & PFF == 0 {
        return Ok(Decoded {
            len: (b0 & 0x3F) as usize,
            consumed: 1,
        });
    }
    match buf.get(1) {
        Some(&b1) => Ok(Decoded {
            len: (((b0 & 0x3F) as usize) << 8) | b1 as usize,
            consumed: 2,
        }),
        None => Err(SeparatorError::Truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_boundaries() {
        let sep = encode(0).unwrap();
        assert_eq!(sep.as_slice(), &[0x00]);

        let sep = encode(40).unwrap();
        assert_eq!(sep.as_slice(), &[0x28]);

        let sep = encode(63).unwrap();
        assert_eq!(sep.as_slice(), &[0x3F]);
    }

    #[test]
    fn long_form_boundaries() {
        // 64 is the first length that needs the two-byte form.
        let sep = encode(64).unwrap();
        assert_eq!(sep.as_slice(), &[0x40, 0x40]);

        let sep = encode(100).unwrap();
        assert_eq!(sep.as_slice(), &[0x40, 0x64]);

        let sep = encode(16383).unwrap();
        assert_eq!(sep.as_slice(), &[0x7F, 0xFF]);
    }

    #[test]
    fn too_long_is_rejected() {
        assert_eq!(encode(16384), Err(SeparatorError::TooLong(16384)));
        assert_eq!(encode(usize::MAX), Err(SeparatorError::TooLong(usize::MAX)));
    }

    #[test]
    fn roundtrip_all_encodable_lengths() {
        for len in 0..=16383usize {
            let sep = encode(len).unwrap();
            assert_eq!(sep.len(), encoded_len(len));
            let decoded = decode(sep.as_slice()).unwrap();
            assert_eq!(decoded.len, len, "length {len} did not round-trip");
            assert_eq!(decoded.consumed, sep.len());
        }
    }

    #[test]
    fn long_form_lengths_past_127_use_unsigned_arithmetic() {
        // The low byte has its high bit set; a signed read would truncate.
        let decoded = decode(&[0x40, 0xFF]).unwrap();
        assert_eq!(decoded.len, 255);
        assert_eq!(decoded.consumed, 2);

        let decoded = decode(&[0x41, 0x80]).unwrap();
        assert_eq!(decoded.len, 384);
    }

    #[test]
    fn marker_bit_rejects() {
        assert_eq!(decode(&[0x80]), Err(SeparatorError::BadSeparator(0x80)));
        assert_eq!(
            decode(&[0xC1, 0x22]),
            Err(SeparatorError::BadSeparator(0xC1))
        );
    }

    #[test]
    fn truncated_long_form_rejects() {
        assert_eq!(decode(&[0x40]), Err(SeparatorError::Truncated));
        assert_eq!(decode(&[]), Err(SeparatorError::Truncated));
    }

    #[test]
    fn short_form_decode_ignores_trailing_bytes() {
        let decoded = decode(&[0x05, 0xAA, 0xBB]).unwrap();
        assert_eq!(decoded.len, 5);
        assert_eq!(decoded.consumed, 1);
    }
}
