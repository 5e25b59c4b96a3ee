//! Core wire format and multiplexing state for the muxtun tunnel optimizer.
//!
//! This crate defines the per-packet length separator, the bundle buffer
//! that accumulates packets into one outgoing datagram, the demultiplexer
//! for incoming bundles, and the flush-trigger arithmetic. It performs no
//! I/O; the event loop in `muxtun-node` drives these pieces.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bundle;
pub mod constants;
pub mod demux;
pub mod error;
pub mod separator;
pub mod trigger;

pub use bundle::{Append, BundleBuffer};
pub use demux::{demux, Demuxed};
pub use error::{DemuxError, SeparatorError};
pub use separator::{decode, encode, encoded_len, Decoded, Separator};
pub use trigger::{FlushReasons, Triggers};
