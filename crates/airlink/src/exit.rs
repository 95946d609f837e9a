use std::fmt;

use airlink_engine::EngineError;
use airlink_frame::FrameError;

// Exit code constants shared by all subcommands.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const LINK_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::SendTimeout(_) | FrameError::RecvTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        FrameError::BadChannel(_) | FrameError::ChannelDisabled(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(LINK_ERROR, format!("{context}: {other}")),
    }
}

pub fn engine_error(context: &str, err: EngineError) -> CliError {
    match err {
        EngineError::Send(err) | EngineError::Recv(err) => frame_error(context, err),
        EngineError::Param(_) => CliError::new(USAGE, format!("{context}: {err}")),
        EngineError::Proto(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        EngineError::ErrorReply => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
