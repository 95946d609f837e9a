//! Polled byte-port abstraction for the companion module link.
//!
//! The host this protocol was designed for has no interrupt line on its
//! communication port, so everything above this layer is built on polling.
//! A [`LinkPort`] exposes FIFO readiness, single-byte put/get, FIFO reset,
//! module control lines, and a register loopback mode used for self-tests.
//!
//! This is the lowest layer of airlink. Everything else builds on top of
//! the [`LinkPort`] trait provided here.

pub mod error;
pub mod loopback;
pub mod selftest;
pub mod traits;

pub use error::{LoopbackReadback, PortError, Result};
pub use loopback::LoopbackPort;
pub use selftest::loopback_self_test;
pub use traits::{CtrlLine, LinkPort};
