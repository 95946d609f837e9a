use clap::{Args, Subcommand};

use crate::exit::CliResult;

pub mod decode;
pub mod doctor;
pub mod echo;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full stack against the in-memory module and report per check.
    Doctor(DoctorArgs),
    /// Decode a hex-encoded frame or control envelope.
    Decode(DecodeArgs),
    /// Round-trip a payload through the in-memory module.
    Echo(EchoArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Doctor(args) => doctor::run(args),
        Command::Decode(args) => decode::run(args),
        Command::Echo(args) => echo::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes of a complete frame (with delimiters) or a bare envelope.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Payload to echo.
    #[arg(long, default_value = "ECHO TEST STRING!")]
    pub data: String,
}
