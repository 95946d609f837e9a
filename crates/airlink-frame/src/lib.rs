//! Delimiter-framed channel multiplexing over a polled byte port.
//!
//! Multiplexes up to four logical channels over one full-duplex byte link.
//! Each frame is delimited by the marker byte `0x7E` at both ends:
//!
//! ```text
//! ┌──────┬──────────────────┬─────────┬────────────────┬──────┐
//! │ 0x7E │ ch<<4 | len_high │ len_low │ payload        │ 0x7E │
//! │ STX  │ (1B)             │ (1B)    │ (len bytes)    │ ETX  │
//! └──────┴──────────────────┴─────────┴────────────────┴──────┘
//! ```
//!
//! The channel occupies the top 4 bits of the second byte; the length is a
//! 12-bit field (max 4095) split across the second and third bytes. Channel 0
//! is reserved for the command/reply envelope of the layer above.
//!
//! All waiting is a bounded poll-iteration count supplied by the caller; the
//! underlying host has no interrupts to wait on.

pub mod error;
pub mod framer;

pub use error::{FrameError, Result};
pub use framer::Framer;

/// Marker byte used both to start and to end a frame.
pub const DELIMITER: u8 = 0x7E;

/// Number of multiplexed channels.
pub const MAX_CHANNELS: u8 = 4;

/// Maximum payload length of one frame (12-bit length field).
pub const MAX_PAYLOAD: usize = 4095;

/// Frame overhead in bytes: STX, two header bytes, ETX.
pub const FRAME_OVERHEAD: usize = 4;

/// Channel carrying command envelopes.
pub const CTRL_CHANNEL: u8 = 0;
