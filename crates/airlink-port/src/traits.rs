/// Module control lines driven through the port.
///
/// These map to modem-control outputs on the host side of the link and
/// steer the companion module's boot behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtrlLine {
    /// Holds the module in reset while asserted.
    Reset,
    /// Selects firmware-programming boot mode while asserted.
    Program,
    /// Puts the module in low-power mode while asserted.
    PowerDown,
}

/// A polled full-duplex byte port connected to the companion module.
///
/// No method blocks: readiness is reported by [`tx_ready`](LinkPort::tx_ready)
/// and [`rx_ready`](LinkPort::rx_ready), and all waiting happens in the caller
/// as a bounded poll loop. Calling [`get`](LinkPort::get) with no byte ready or
/// [`put`](LinkPort::put) with a full FIFO is allowed to drop data, so callers
/// must check readiness first.
pub trait LinkPort {
    /// There is room in the transmit FIFO for at least one byte.
    fn tx_ready(&self) -> bool;

    /// Push one byte into the transmit FIFO.
    fn put(&mut self, byte: u8);

    /// At least one received byte is waiting.
    fn rx_ready(&self) -> bool;

    /// Pop one byte from the receive FIFO.
    fn get(&mut self) -> u8;

    /// Number of bytes the transmit FIFO accepts when empty.
    ///
    /// The framer sends payloads in chunks of this size.
    fn tx_fifo_len(&self) -> usize {
        16
    }

    /// Discard anything queued in both FIFOs.
    fn reset_fifos(&mut self);

    /// Drive a module control line.
    fn set_line(&mut self, line: CtrlLine, asserted: bool);

    /// Route transmitted bytes back into the receive FIFO.
    ///
    /// Register-level loopback, used only by the engine's init self-test.
    fn set_loopback(&mut self, on: bool);
}
