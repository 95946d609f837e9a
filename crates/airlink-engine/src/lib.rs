//! Synchronous command/reply engine for the companion module.
//!
//! The engine drives the control channel of a framed link: it encodes
//! requests into a single shared command buffer, pairs each with its reply in
//! strict FIFO order, and exposes the module surface as typed operations.
//! Polling waits (association, TCP establishment, detection) go through a
//! [`Scheduler`], so tests run them tick by tick without sleeping.
//!
//! [`ModuleSim`] is a scripted in-memory module for integration tests and
//! diagnostics.

pub mod config;
pub mod engine;
pub mod error;
mod http;
pub mod scheduler;
pub mod sim;

pub use config::EngineConfig;
pub use engine::{Engine, EventHandler, CFG_SLOTS, HTTP_CHANNEL};
pub use error::{EngineError, Result};
pub use scheduler::{Scheduler, StdScheduler};
pub use sim::ModuleSim;
