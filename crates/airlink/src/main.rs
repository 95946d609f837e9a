mod cmd;
mod exit;
mod logging;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "airlink", version, about = "Companion-module link CLI")]
struct Cli {
    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cmd::run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_doctor_subcommand() {
        let cli = Cli::try_parse_from(["airlink", "doctor"]).expect("doctor args should parse");
        assert!(matches!(cli.command, Command::Doctor(_)));
    }

    #[test]
    fn parses_decode_subcommand() {
        let cli = Cli::try_parse_from(["airlink", "decode", "7e00001200017e"])
            .expect("decode args should parse");
        assert!(matches!(cli.command, Command::Decode(_)));
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::try_parse_from(["airlink", "doctor", "--log-level", "trace"])
            .expect("global log level should parse after the subcommand");
        assert!(matches!(cli.log_level, LogLevel::Trace));
    }

    #[test]
    fn parses_echo_with_payload() {
        let cli = Cli::try_parse_from(["airlink", "echo", "--data", "hello"])
            .expect("echo args should parse");
        assert!(matches!(cli.command, Command::Echo(_)));
    }
}
