use std::collections::VecDeque;

use crate::traits::{CtrlLine, LinkPort};

/// An in-memory port for tests and diagnostics.
///
/// By default the port is "wired back": every transmitted byte shows up on
/// the receive side, as if a loopback plug were fitted on the connector.
/// With [`set_wired`](LoopbackPort::set_wired) off, transmitted bytes collect
/// in an outbox readable via [`transmitted`](LoopbackPort::transmitted), and
/// received bytes are supplied with [`feed`](LoopbackPort::feed).
#[derive(Debug, Default)]
pub struct LoopbackPort {
    tx: VecDeque<u8>,
    rx: VecDeque<u8>,
    wired: bool,
    register_loopback: bool,
    lines: [bool; 3],
}

impl LoopbackPort {
    /// Create a wired-back port.
    pub fn new() -> Self {
        Self {
            wired: true,
            ..Self::default()
        }
    }

    /// Create a port with separate in/out sides.
    pub fn unwired() -> Self {
        Self::default()
    }

    /// Wire transmitted bytes back into the receive FIFO.
    pub fn set_wired(&mut self, wired: bool) {
        self.wired = wired;
    }

    /// Queue bytes on the receive side.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Take everything transmitted so far.
    pub fn transmitted(&mut self) -> Vec<u8> {
        self.tx.drain(..).collect()
    }

    /// Current state of a control line.
    pub fn line(&self, line: CtrlLine) -> bool {
        self.lines[line_index(line)]
    }
}

fn line_index(line: CtrlLine) -> usize {
    match line {
        CtrlLine::Reset => 0,
        CtrlLine::Program => 1,
        CtrlLine::PowerDown => 2,
    }
}

impl LinkPort for LoopbackPort {
    fn tx_ready(&self) -> bool {
        true
    }

    fn put(&mut self, byte: u8) {
        if self.register_loopback || self.wired {
            self.rx.push_back(byte);
        } else {
            self.tx.push_back(byte);
        }
    }

    fn rx_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    fn get(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }

    fn reset_fifos(&mut self) {
        self.tx.clear();
        self.rx.clear();
    }

    fn set_line(&mut self, line: CtrlLine, asserted: bool) {
        self.lines[line_index(line)] = asserted;
    }

    fn set_loopback(&mut self, on: bool) {
        self.register_loopback = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wired_port_echoes_bytes() {
        let mut port = LoopbackPort::new();
        port.put(0xA5);
        assert!(port.rx_ready());
        assert_eq!(port.get(), 0xA5);
        assert!(!port.rx_ready());
    }

    #[test]
    fn unwired_port_separates_directions() {
        let mut port = LoopbackPort::unwired();
        port.put(1);
        port.put(2);
        assert!(!port.rx_ready());
        assert_eq!(port.transmitted(), vec![1, 2]);

        port.feed(&[3, 4]);
        assert_eq!(port.get(), 3);
        assert_eq!(port.get(), 4);
    }

    #[test]
    fn register_loopback_overrides_outbox() {
        let mut port = LoopbackPort::unwired();
        port.set_loopback(true);
        port.put(0x55);
        assert_eq!(port.get(), 0x55);
        assert!(port.transmitted().is_empty());
    }

    #[test]
    fn control_lines_tracked() {
        let mut port = LoopbackPort::new();
        assert!(!port.line(CtrlLine::Reset));
        port.set_line(CtrlLine::Reset, true);
        assert!(port.line(CtrlLine::Reset));
        port.set_line(CtrlLine::Reset, false);
        assert!(!port.line(CtrlLine::Reset));
    }

    #[test]
    fn fifo_reset_discards_both_sides() {
        let mut port = LoopbackPort::unwired();
        port.put(9);
        port.feed(&[7]);
        port.reset_fifos();
        assert!(!port.rx_ready());
        assert!(port.transmitted().is_empty());
    }
}
