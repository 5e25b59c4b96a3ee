//! Outgoing bundle accumulation.
//!
//! A [`BundleBuffer`] collects `(separator, payload)` pairs into the body
//! of the next outgoing datagram. It never grows past the MTU it was
//! created with: an append that would overflow hands the caller the
//! current contents to send first.

extern crate alloc;
use alloc::vec::Vec;

use crate::error::SeparatorError;
use crate::separator::{encode, encoded_len};

/// Outcome of [`BundleBuffer::try_append`].
#[derive(Debug, PartialEq, Eq)]
pub enum Append {
    /// The payload was appended.
    Stored,
    /// Appending would have exceeded the MTU. The buffer was drained and
    /// its previous contents are returned for sending; the offered
    /// payload has NOT been stored and must be re-offered.
    MtuFlush(Vec<u8>),
}

/// Accumulates separator-prefixed payloads for one outgoing datagram.
#[derive(Debug)]
pub struct BundleBuffer {
    bytes: Vec<u8>,
    count: u32,
    mtu: usize,
}

impl BundleBuffer {
    pub fn new(mtu: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(mtu),
            count: 0,
            mtu,
        }
    }

    /// Append `payload`, or flush first if it would not fit.
    ///
    /// On [`Append::MtuFlush`] the caller sends the returned bundle and
    /// then re-offers the same payload to the now-empty buffer.
    pub fn try_append(&mut self, payload: &[u8]) -> Result<Append, SeparatorError> {
        let predicted = self.bytes.len() + encoded_len(payload.len()) + payload.len();
        if predicted > self.mtu {
            if self.count > 0 {
                return Ok(Append::MtuFlush(self.drain()));
            }
            // A single payload larger than the MTU can never be stored.
            return Err(SeparatorError::TooLong(payload.len()));
        }
        self.push(payload)?;
        Ok(Append::Stored)
    }

    /// Append unconditionally. Used after an [`Append::MtuFlush`] response
    /// freed the buffer.
    pub fn append_now(&mut self, payload: &[u8]) -> Result<(), SeparatorError> {
        self.push(payload)
    }

    fn push(&mut self, payload: &[u8]) -> Result<(), SeparatorError> {
        let sep = encode(payload.len())?;
        self.bytes.extend_from_slice(sep.as_slice());
        self.bytes.extend_from_slice(payload);
        self.count += 1;
        Ok(())
    }

    /// Take the accumulated bundle and reset to empty.
    pub fn drain(&mut self) -> Vec<u8> {
        self.count = 0;
        core::mem::take(&mut self.bytes)
    }

    /// Number of packets currently buffered.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Serialized size of the buffered bundle in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_tracks_size_and_count() {
        let mut buf = BundleBuffer::new(1500);
        assert!(buf.is_empty());

        assert_eq!(buf.try_append(&[0xAA; 40]).unwrap(), Append::Stored);
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.size(), 41);

        assert_eq!(buf.try_append(&[0xBB; 100]).unwrap(), Append::Stored);
        assert_eq!(buf.count(), 2);
        // 41 + two-byte separator + 100.
        assert_eq!(buf.size(), 143);
    }

    #[test]
    fn size_grows_by_exactly_separator_plus_payload() {
        let payload = [0u8; 200];
        let mut buf = BundleBuffer::new(1500);
        for len in [0usize, 1, 63, 64, 200] {
            let before = buf.size();
            let count_before = buf.count();
            buf.try_append(&payload[..len]).unwrap();
            assert_eq!(buf.size(), before + encoded_len(len) + len);
            assert_eq!(buf.count(), count_before + 1);
        }
    }

    #[test]
    fn drain_returns_bytes_and_resets() {
        let mut buf = BundleBuffer::new(1500);
        buf.try_append(&[0x11; 40]).unwrap();
        buf.try_append(&[0x22; 50]).unwrap();

        let bundle = buf.drain();
        assert_eq!(bundle.len(), 92);
        assert_eq!(bundle[0], 0x28);
        assert_eq!(bundle[41], 0x32);
        assert!(buf.is_empty());
        assert_eq!(buf.size(), 0);

        // Draining an empty buffer yields an empty bundle.
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn mtu_preemption_flushes_current_contents() {
        let mut buf = BundleBuffer::new(1500);
        // Fill to exactly 1400 bytes: 2-byte separator + 1398 payload.
        buf.try_append(&[0x33; 1398]).unwrap();
        assert_eq!(buf.size(), 1400);

        // 1400 + 2 + 120 = 1522 > 1500, so the current bundle comes back.
        match buf.try_append(&[0x44; 120]).unwrap() {
            Append::MtuFlush(bundle) => assert_eq!(bundle.len(), 1400),
            other => panic!("expected MtuFlush, got {other:?}"),
        }
        assert!(buf.is_empty());

        buf.append_now(&[0x44; 120]).unwrap();
        assert_eq!(buf.size(), 122);
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn size_never_exceeds_mtu() {
        let mut buf = BundleBuffer::new(300);
        for _ in 0..50 {
            match buf.try_append(&[0x55; 40]).unwrap() {
                Append::Stored => {}
                Append::MtuFlush(bundle) => {
                    assert!(bundle.len() <= 300);
                    buf.append_now(&[0x55; 40]).unwrap();
                }
            }
            assert!(buf.size() <= 300);
        }
    }

    #[test]
    fn oversized_single_payload_is_an_error() {
        let mut buf = BundleBuffer::new(200);
        assert_eq!(
            buf.try_append(&[0x66; 400]),
            Err(SeparatorError::TooLong(400))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn exact_fit_is_stored() {
        let mut buf = BundleBuffer::new(41);
        assert_eq!(buf.try_append(&[0x77; 40]).unwrap(), Append::Stored);
        assert_eq!(buf.size(), 41);
    }
}
