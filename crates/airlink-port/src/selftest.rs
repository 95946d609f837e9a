use tracing::debug;

use crate::error::{LoopbackReadback, PortError, Result};
use crate::traits::LinkPort;

/// Byte patterns written during the self-test. Alternating-bit values catch
/// stuck data lines.
const PATTERNS: [u8; 2] = [0x55, 0xAA];

/// Run a register loopback self-test on the port.
///
/// Switches the port into loopback mode, writes each test pattern and polls
/// (up to `budget` iterations per byte) for it to come back. Loopback mode is
/// always switched off again before returning. The FIFOs are reset first so
/// stale bytes cannot fake a pass.
pub fn loopback_self_test<P: LinkPort>(port: &mut P, budget: u32) -> Result<()> {
    port.reset_fifos();
    port.set_loopback(true);
    let result = run_patterns(port, budget);
    port.set_loopback(false);
    port.reset_fifos();
    result
}

fn run_patterns<P: LinkPort>(port: &mut P, budget: u32) -> Result<()> {
    for pattern in PATTERNS {
        let mut wait = budget;
        while !port.tx_ready() {
            wait = wait.checked_sub(1).ok_or(PortError::Stalled(budget))?;
        }
        port.put(pattern);

        let mut wait = budget;
        while !port.rx_ready() {
            wait = wait.checked_sub(1).ok_or(PortError::LoopbackMismatch {
                sent: pattern,
                got: LoopbackReadback::Nothing,
            })?;
        }
        let got = port.get();
        if got != pattern {
            return Err(PortError::LoopbackMismatch {
                sent: pattern,
                got: LoopbackReadback::Byte(got),
            });
        }
    }
    debug!("port loopback self-test passed");
    Ok(())
}
