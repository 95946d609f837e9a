use std::time::Duration;

use airlink_proto::DEF_CMD_BUFLEN;

/// Tunables for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Command buffer length in bytes. Must be at least
    /// [`MIN_CMD_BUFLEN`](airlink_proto::MIN_CMD_BUFLEN); also caps the chunk
    /// size of bulk transfers.
    pub buf_len: usize,
    /// Poll-iteration budget handed to every framer operation.
    pub frame_wait: u32,
    /// Tick period of the polling state machines.
    pub poll_interval: Duration,
    /// Version-query attempts made by [`detect`](crate::Engine::detect).
    pub detect_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buf_len: DEF_CMD_BUFLEN,
            frame_wait: 100_000,
            poll_interval: Duration::from_millis(100),
            detect_retries: 10,
        }
    }
}
