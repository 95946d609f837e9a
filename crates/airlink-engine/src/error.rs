use airlink_frame::FrameError;
use airlink_port::PortError;
use airlink_proto::ProtoError;

/// Errors that can occur in engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine has not completed a successful [`init`](crate::Engine::init).
    #[error("engine not initialized")]
    NotReady,

    /// An argument failed validation before any port I/O.
    #[error("invalid argument: {0}")]
    Param(&'static str),

    /// The configured command buffer cannot carry every command.
    #[error("command buffer too short ({len} bytes, min {min})")]
    BufferTooShort { len: usize, min: usize },

    /// The port self-test failed during init.
    #[error("port self-test failed: {0}")]
    SelfTest(#[from] PortError),

    /// A frame could not be sent.
    #[error("send failed: {0}")]
    Send(FrameError),

    /// A frame could not be received.
    #[error("receive failed: {0}")]
    Recv(FrameError),

    /// A reply arrived but could not be decoded.
    #[error("malformed reply: {0}")]
    Proto(#[from] ProtoError),

    /// The module answered with a negative reply.
    #[error("module rejected the command")]
    ErrorReply,
}

pub type Result<T> = std::result::Result<T, EngineError>;
