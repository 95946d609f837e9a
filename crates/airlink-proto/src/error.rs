/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// The command buffer cannot hold the encoded request.
    #[error("command buffer too short ({len} bytes, need {need})")]
    BufferTooShort { len: usize, need: usize },

    /// A reply payload ended before its fixed fields.
    #[error("reply truncated ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },

    /// The opcode field holds a value outside the command table.
    #[error("unknown opcode 0x{0:04X}")]
    UnknownOpcode(u16),

    /// A string argument exceeds its wire field.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A numeric field holds a value outside its enumeration.
    #[error("invalid {what} value {value}")]
    BadValue { what: &'static str, value: u32 },

    /// Scan data ends in the middle of an entry.
    #[error("scan list truncated at offset {0}")]
    ScanTruncated(usize),

    /// A text field is not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
