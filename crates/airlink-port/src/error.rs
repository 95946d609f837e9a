/// Errors that can occur at the byte-port layer.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The port's register loopback self-test read back wrong data.
    #[error("loopback self-test failed (sent 0x{sent:02X}, got {got})")]
    LoopbackMismatch {
        sent: u8,
        got: LoopbackReadback,
    },

    /// The port stopped accepting or producing bytes.
    #[error("port stalled after {0} polls")]
    Stalled(u32),
}

/// What came back during a loopback self-test, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackReadback {
    /// A byte arrived but did not match.
    Byte(u8),
    /// No byte arrived within the poll budget.
    Nothing,
}

impl std::fmt::Display for LoopbackReadback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopbackReadback::Byte(b) => write!(f, "0x{b:02X}"),
            LoopbackReadback::Nothing => write!(f, "nothing"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortError>;
