use std::time::Duration;

use airlink_engine::{Engine, EngineConfig, ModuleSim, StdScheduler};

use crate::cmd::EchoArgs;
use crate::exit::{engine_error, CliResult, FAILURE, SUCCESS};

/// Round-trip a payload through the in-memory module and print the reply.
pub fn run(args: EchoArgs) -> CliResult<i32> {
    let mut engine = Engine::new(
        ModuleSim::new(),
        StdScheduler,
        EngineConfig {
            poll_interval: Duration::ZERO,
            ..EngineConfig::default()
        },
    );
    engine.init().map_err(|e| engine_error("init", e))?;
    engine.detect().map_err(|e| engine_error("detect", e))?;

    let reply = engine
        .echo(args.data.as_bytes())
        .map_err(|e| engine_error("echo", e))?;
    println!("{}", String::from_utf8_lossy(reply));

    if reply == args.data.as_bytes() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
