//! Error types for the muxtun-core crate.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparatorError {
    /// Bit 7 of the first separator byte was set.
    BadSeparator(u8),
    /// A long-form separator was started but the second byte is missing.
    Truncated,
    /// The payload length does not fit the two-byte separator form.
    TooLong(usize),
}

impl fmt::Display for SeparatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeparatorError::BadSeparator(b) => {
                write!(f, "bad separator: first byte 0x{b:02x} has the marker bit set")
            }
            SeparatorError::Truncated => write!(f, "truncated two-byte separator"),
            SeparatorError::TooLong(len) => {
                write!(f, "payload length {len} exceeds the separator maximum")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SeparatorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxError {
    /// A separator inside the datagram was malformed; the remainder of
    /// the datagram was dropped.
    BadSeparator(u8),
    /// A separator declared more bytes than the datagram holds.
    BadLength { declared: usize, remaining: usize },
}

impl fmt::Display for DemuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemuxError::BadSeparator(b) => {
                write!(f, "bad separator 0x{b:02x} in received bundle")
            }
            DemuxError::BadLength {
                declared,
                remaining,
            } => {
                write!(
                    f,
                    "separator declares {declared} bytes but only {remaining} remain"
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DemuxError {}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn display_is_nonempty_for_all_variants() {
        assert!(!SeparatorError::Truncated.to_string().is_empty());
        assert!(!SeparatorError::TooLong(20000).to_string().is_empty());
        assert!(SeparatorError::BadSeparator(0x80)
            .to_string()
            .contains("0x80"));
        assert!(DemuxError::BadSeparator(0xC1).to_string().contains("0xc1"));
        assert!(DemuxError::BadLength {
            declared: 100,
            remaining: 3
        }
        .to_string()
        .contains("100"));
    }
}
