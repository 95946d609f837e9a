//! Host-side driver stack for a framed serial Wi-Fi companion module.
//!
//! airlink talks to a companion module over a full-duplex byte link: a
//! delimiter framer multiplexes four channels over the wire, and a
//! command/reply engine drives the module's control surface on channel 0.
//!
//! # Crate Structure
//!
//! - [`port`] — Polled byte-port abstraction and loopback self-test
//! - [`frame`] — Delimiter framing with channel multiplexing
//! - [`proto`] — Command/reply envelope codec and wire types
//! - [`engine`] — Synchronous protocol engine and module simulator

/// Re-export port types.
pub mod port {
    pub use airlink_port::*;
}

/// Re-export frame types.
pub mod frame {
    pub use airlink_frame::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use airlink_proto::*;
}

/// Re-export engine types.
pub mod engine {
    pub use airlink_engine::*;
}
