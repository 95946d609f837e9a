//! Command/reply envelope codec for the companion module control channel.
//!
//! Every control exchange is one envelope on channel 0:
//!
//! ```text
//! ┌─────────────┬──────────────┬──────────────────────────┐
//! │ opcode (2B) │ length (2B)  │ opcode-specific payload  │
//! │ big-endian  │ big-endian   │ (length bytes)           │
//! └─────────────┴──────────────┴──────────────────────────┘
//! ```
//!
//! Requests are the [`Request`] union with explicit encoding into a shared
//! command buffer; replies arrive with opcode [`OpCode::Ok`] (payload shaped
//! by the request that was issued) or [`OpCode::Error`], and are decoded by
//! the typed parsers in [`reply`].
//!
//! All multi-byte fields are big-endian; the wire format was defined by a
//! big-endian host.

pub mod error;
pub mod opcode;
pub mod reply;
pub mod request;
pub mod types;

pub use error::{ProtoError, Result};
pub use opcode::OpCode;
pub use request::Request;
pub use types::{
    pack_datagram, scan_entry_at, unpack_datagram, ApConfig, AuthMode, DateTime, HttpMethod,
    IpConfig, ScanEntry, ScanIter, SntpConfig, SockState, SysState, SysStatus,
};

/// Envelope header length: opcode + payload length.
pub const HEADER_LEN: usize = 4;

/// Minimum command buffer able to carry every fixed-size command.
pub const MIN_CMD_BUFLEN: usize = 104;

/// Default command buffer length.
pub const DEF_CMD_BUFLEN: usize = 512;

/// Maximum SSID length in bytes.
pub const SSID_MAXLEN: usize = 32;

/// Maximum passphrase length in bytes.
pub const PASS_MAXLEN: usize = 64;

/// Maximum time-server name length in bytes, terminator included.
pub const NTP_POOL_MAXLEN: usize = 80;

/// Number of time servers carried by a time-sync configuration.
pub const NTP_SERVER_SLOTS: usize = 3;

/// Width of the NUL-padded ASCII port fields in socket commands.
pub const PORT_STR_LEN: usize = 6;
