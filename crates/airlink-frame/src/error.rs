/// Errors that can occur while framing or deframing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Channel id out of the 0..=3 range.
    #[error("invalid channel {0} (max 3)")]
    BadChannel(u8),

    /// Operation on a channel that has not been enabled.
    #[error("channel {0} is disabled")]
    ChannelDisabled(u8),

    /// The payload exceeds the 12-bit frame length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A received frame declared more payload than the caller's buffer holds.
    #[error("frame length {len} exceeds receive capacity {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },

    /// The byte where the trailing delimiter belongs held something else.
    /// Possible data loss; the frame is discarded.
    #[error("framing error: expected trailing delimiter, got 0x{0:02X}")]
    BadTrailer(u8),

    /// The transmit FIFO never became ready within the poll budget.
    #[error("send timed out after {0} polls")]
    SendTimeout(u32),

    /// No byte arrived within the poll budget.
    #[error("receive timed out after {0} polls")]
    RecvTimeout(u32),

    /// Split-mode bytes do not add up to the declared total.
    #[error("split frame length mismatch: {sent} of {total} bytes sent")]
    SplitLength { sent: usize, total: usize },

    /// Split continuation without a preceding split start.
    #[error("no split frame in progress")]
    SplitNotStarted,
}

pub type Result<T> = std::result::Result<T, FrameError>;
