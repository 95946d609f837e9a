use airlink_port::LinkPort;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::{DELIMITER, MAX_CHANNELS, MAX_PAYLOAD};

/// Frames and deframes multiplexed channel traffic over a [`LinkPort`].
///
/// The framer owns the port. Channels must be enabled before they carry
/// traffic in either direction. Every wait is a bounded poll-iteration count;
/// the budget resets each time a FIFO chunk is accepted, so it bounds stall
/// time rather than total transfer time.
pub struct Framer<P> {
    port: P,
    enabled: [bool; MAX_CHANNELS as usize],
    // Remaining payload bytes of a split frame in progress.
    split: Option<usize>,
}

impl<P: LinkPort> Framer<P> {
    /// Wrap a port. All channels start disabled.
    pub fn new(port: P) -> Self {
        Self {
            port,
            enabled: [false; MAX_CHANNELS as usize],
            split: None,
        }
    }

    /// Borrow the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the framer and return the port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Allow a channel to send and receive.
    pub fn enable(&mut self, ch: u8) -> Result<()> {
        check_channel(ch)?;
        self.enabled[ch as usize] = true;
        Ok(())
    }

    /// Stop a channel from sending and receiving.
    pub fn disable(&mut self, ch: u8) -> Result<()> {
        check_channel(ch)?;
        self.enabled[ch as usize] = false;
        Ok(())
    }

    /// Whether a channel is currently enabled.
    pub fn is_enabled(&self, ch: u8) -> bool {
        ch < MAX_CHANNELS && self.enabled[ch as usize]
    }

    /// Send one complete frame on an enabled channel.
    ///
    /// Returns the number of payload bytes sent. Fails without touching the
    /// port if the channel or length precondition does not hold.
    pub fn send(&mut self, data: &[u8], ch: u8, max_wait: u32) -> Result<usize> {
        self.check_sendable(ch, data.len())?;

        self.emit_header(data.len(), ch, max_wait)?;
        self.poll_send(data, max_wait)?;
        self.emit_trailer(max_wait)?;

        trace!(ch, len = data.len(), "frame sent");
        Ok(data.len())
    }

    /// Start a split frame: emit the header for `total` payload bytes and an
    /// optional first chunk.
    ///
    /// The rest of the payload is supplied with [`split_next`](Self::split_next)
    /// and the frame is closed by [`split_end`](Self::split_end). Useful when
    /// the total length is known up front but the content is produced in
    /// pieces.
    pub fn split_start(&mut self, first: &[u8], total: usize, ch: u8, max_wait: u32) -> Result<usize> {
        self.check_sendable(ch, total)?;
        if first.len() > total {
            return Err(FrameError::SplitLength {
                sent: first.len(),
                total,
            });
        }

        self.emit_header(total, ch, max_wait)?;
        self.poll_send(first, max_wait)?;
        self.split = Some(total - first.len());
        Ok(first.len())
    }

    /// Append payload bytes to the split frame in progress.
    pub fn split_next(&mut self, data: &[u8], max_wait: u32) -> Result<usize> {
        let remaining = self.split.ok_or(FrameError::SplitNotStarted)?;
        if data.len() > remaining {
            self.split = None;
            return Err(FrameError::SplitLength {
                sent: data.len(),
                total: remaining,
            });
        }
        if let Err(err) = self.poll_send(data, max_wait) {
            self.split = None;
            return Err(err);
        }
        self.split = Some(remaining - data.len());
        Ok(data.len())
    }

    /// Append the final payload bytes and close the split frame.
    ///
    /// The bytes supplied across start/next/end must add up exactly to the
    /// declared total.
    pub fn split_end(&mut self, data: &[u8], max_wait: u32) -> Result<usize> {
        let remaining = self.split.take().ok_or(FrameError::SplitNotStarted)?;
        if data.len() != remaining {
            return Err(FrameError::SplitLength {
                sent: data.len(),
                total: remaining,
            });
        }
        self.poll_send(data, max_wait)?;
        self.emit_trailer(max_wait)?;
        Ok(data.len())
    }

    /// Receive one frame into `buf`.
    ///
    /// Runs the receive state machine from its start state: scan for the
    /// delimiter, decode channel and length, copy the payload, require the
    /// trailing delimiter. On success returns `(channel, payload_len)`. On any
    /// failure the in-progress frame is discarded whole; the next call
    /// resynchronizes by scanning for the next delimiter.
    pub fn receive(&mut self, buf: &mut [u8], max_wait: u32) -> Result<(u8, usize)> {
        // STX scan: discard until the marker is seen.
        loop {
            if self.next_byte(max_wait)? == DELIMITER {
                break;
            }
        }

        // Channel and high length bits. A marker here, before any payload
        // byte, is the true STX: the one we matched above was the previous
        // frame's trailer.
        let mut hdr = self.next_byte(max_wait)?;
        while hdr == DELIMITER {
            hdr = self.next_byte(max_wait)?;
        }
        let ch = hdr >> 4;
        check_channel(ch)?;
        if !self.enabled[ch as usize] {
            return Err(FrameError::ChannelDisabled(ch));
        }

        let len = usize::from(hdr & 0x0F) << 8 | usize::from(self.next_byte(max_wait)?);
        if len > buf.len() {
            return Err(FrameError::CapacityExceeded {
                len,
                capacity: buf.len(),
            });
        }

        for slot in buf[..len].iter_mut() {
            *slot = self.next_byte(max_wait)?;
        }

        let trailer = self.next_byte(max_wait)?;
        if trailer != DELIMITER {
            return Err(FrameError::BadTrailer(trailer));
        }

        trace!(ch, len, "frame received");
        Ok((ch, len))
    }

    fn check_sendable(&mut self, ch: u8, len: usize) -> Result<()> {
        check_channel(ch)?;
        if len > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD,
            });
        }
        if !self.enabled[ch as usize] {
            return Err(FrameError::ChannelDisabled(ch));
        }
        Ok(())
    }

    fn emit_header(&mut self, len: usize, ch: u8, max_wait: u32) -> Result<()> {
        self.wait_tx(max_wait)?;
        self.port.put(DELIMITER);
        self.port.put(ch << 4 | (len >> 8) as u8);
        self.port.put((len & 0xFF) as u8);
        Ok(())
    }

    fn emit_trailer(&mut self, max_wait: u32) -> Result<()> {
        self.wait_tx(max_wait)?;
        self.port.put(DELIMITER);
        Ok(())
    }

    // Payload goes out in chunks of up to one TX FIFO. The wait budget is
    // reset each time a chunk is accepted.
    fn poll_send(&mut self, data: &[u8], max_wait: u32) -> Result<()> {
        let fifo = self.port.tx_fifo_len().max(1);
        for chunk in data.chunks(fifo) {
            self.wait_tx(max_wait)?;
            for &b in chunk {
                self.port.put(b);
            }
        }
        Ok(())
    }

    fn wait_tx(&mut self, max_wait: u32) -> Result<()> {
        let mut wait = max_wait;
        while !self.port.tx_ready() {
            wait = wait
                .checked_sub(1)
                .ok_or(FrameError::SendTimeout(max_wait))?;
            if wait == 0 {
                return Err(FrameError::SendTimeout(max_wait));
            }
        }
        Ok(())
    }

    fn next_byte(&mut self, max_wait: u32) -> Result<u8> {
        let mut wait = max_wait;
        while !self.port.rx_ready() {
            wait = wait
                .checked_sub(1)
                .ok_or(FrameError::RecvTimeout(max_wait))?;
            if wait == 0 {
                return Err(FrameError::RecvTimeout(max_wait));
            }
        }
        Ok(self.port.get())
    }
}

fn check_channel(ch: u8) -> Result<()> {
    if ch >= MAX_CHANNELS {
        return Err(FrameError::BadChannel(ch));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use airlink_port::{CtrlLine, LinkPort, LoopbackPort};

    use super::*;

    const WAIT: u32 = 64;

    fn wired_framer() -> Framer<LoopbackPort> {
        let mut framer = Framer::new(LoopbackPort::new());
        for ch in 0..MAX_CHANNELS {
            framer.enable(ch).unwrap();
        }
        framer
    }

    #[test]
    fn roundtrip_on_control_channel() {
        let mut framer = wired_framer();
        let payload = b"ECHO TEST STRING!\0";
        assert_eq!(payload.len(), 18);

        assert_eq!(framer.send(payload, 0, WAIT).unwrap(), 18);

        let mut buf = [0u8; 64];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!(ch, 0);
        assert_eq!(len, 18);
        assert_eq!(&buf[..len], payload);
    }

    #[test]
    fn roundtrip_all_channels() {
        let mut framer = wired_framer();
        for ch in 0..MAX_CHANNELS {
            let payload = [ch; 7];
            framer.send(&payload, ch, WAIT).unwrap();

            let mut buf = [0u8; 16];
            let (got_ch, len) = framer.receive(&mut buf, WAIT).unwrap();
            assert_eq!(got_ch, ch);
            assert_eq!(&buf[..len], &payload);
        }
    }

    #[test]
    fn roundtrip_empty_payload() {
        let mut framer = wired_framer();
        framer.send(&[], 2, WAIT).unwrap();

        let mut buf = [0u8; 4];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, len), (2, 0));
    }

    #[test]
    fn roundtrip_max_payload() {
        let mut framer = wired_framer();
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| i as u8).collect();
        framer.send(&payload, 1, WAIT).unwrap();

        let mut buf = vec![0u8; MAX_PAYLOAD];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!(ch, 1);
        assert_eq!(len, MAX_PAYLOAD);
        assert_eq!(buf, payload);
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut framer = wired_framer();
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = framer.send(&payload, 0, WAIT).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn bad_channel_rejected_without_port_io() {
        let mut framer = Framer::new(LoopbackPort::unwired());

        assert!(matches!(
            framer.enable(4),
            Err(FrameError::BadChannel(4))
        ));
        assert!(matches!(
            framer.disable(7),
            Err(FrameError::BadChannel(7))
        ));
        assert!(matches!(
            framer.send(b"x", 4, WAIT),
            Err(FrameError::BadChannel(4))
        ));
        assert!(framer.port_mut().transmitted().is_empty());
    }

    #[test]
    fn disabled_channel_rejected_without_port_io() {
        let mut framer = Framer::new(LoopbackPort::unwired());
        let err = framer.send(b"x", 1, WAIT).unwrap_err();
        assert!(matches!(err, FrameError::ChannelDisabled(1)));
        assert!(framer.port_mut().transmitted().is_empty());
    }

    #[test]
    fn received_frame_on_disabled_channel_rejected() {
        let mut framer = Framer::new(LoopbackPort::unwired());
        framer.enable(0).unwrap();
        // Frame addressed to channel 2, which is disabled.
        framer.port_mut().feed(&[DELIMITER, 0x20, 0x01, 0xAB, DELIMITER]);

        let mut buf = [0u8; 8];
        let err = framer.receive(&mut buf, WAIT).unwrap_err();
        assert!(matches!(err, FrameError::ChannelDisabled(2)));
    }

    #[test]
    fn declared_length_over_capacity_rejected_before_copy() {
        let mut framer = Framer::new(LoopbackPort::unwired());
        framer.enable(0).unwrap();
        // Declares 16 payload bytes but the caller's buffer holds 8.
        framer.port_mut().feed(&[DELIMITER, 0x00, 0x10]);

        let mut buf = [0u8; 8];
        let err = framer.receive(&mut buf, WAIT).unwrap_err();
        assert!(matches!(
            err,
            FrameError::CapacityExceeded {
                len: 16,
                capacity: 8
            }
        ));
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn bad_trailer_then_resync_on_next_frame() {
        let mut framer = Framer::new(LoopbackPort::unwired());
        framer.enable(0).unwrap();
        framer.enable(1).unwrap();
        // First frame has a corrupt trailer; second is well-formed.
        framer.port_mut().feed(&[DELIMITER, 0x00, 0x01, 0x11, 0x99]);
        framer
            .port_mut()
            .feed(&[DELIMITER, 0x10, 0x02, 0xCA, 0xFE, DELIMITER]);

        let mut buf = [0u8; 8];
        let err = framer.receive(&mut buf, WAIT).unwrap_err();
        assert!(matches!(err, FrameError::BadTrailer(0x99)));

        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, len), (1, 2));
        assert_eq!(&buf[..2], &[0xCA, 0xFE]);
    }

    #[test]
    fn back_to_back_frames_with_no_gap() {
        let mut framer = wired_framer();
        framer.send(b"first", 0, WAIT).unwrap();
        framer.send(b"second", 3, WAIT).unwrap();

        let mut buf = [0u8; 16];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, &buf[..len]), (0, b"first".as_ref()));

        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, &buf[..len]), (3, b"second".as_ref()));
    }

    #[test]
    fn stray_trailer_before_frame_is_skipped() {
        let mut framer = Framer::new(LoopbackPort::unwired());
        framer.enable(1).unwrap();
        // A leftover delimiter (previous frame's trailer) directly followed
        // by a complete frame: the second delimiter must be taken as STX, not
        // as the channel/length byte.
        framer
            .port_mut()
            .feed(&[DELIMITER, DELIMITER, 0x10, 0x01, 0x42, DELIMITER]);

        let mut buf = [0u8; 8];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, len), (1, 1));
        assert_eq!(buf[0], 0x42);
    }

    #[test]
    fn send_times_out_on_stalled_port() {
        struct StalledPort;
        impl LinkPort for StalledPort {
            fn tx_ready(&self) -> bool {
                false
            }
            fn put(&mut self, _byte: u8) {
                unreachable!("stalled port must never accept bytes");
            }
            fn rx_ready(&self) -> bool {
                false
            }
            fn get(&mut self) -> u8 {
                0
            }
            fn reset_fifos(&mut self) {}
            fn set_line(&mut self, _line: CtrlLine, _asserted: bool) {}
            fn set_loopback(&mut self, _on: bool) {}
        }

        let mut framer = Framer::new(StalledPort);
        framer.enable(0).unwrap();
        let err = framer.send(b"data", 0, 8).unwrap_err();
        assert!(matches!(err, FrameError::SendTimeout(8)));
    }

    #[test]
    fn receive_times_out_on_silent_port() {
        let mut framer = Framer::new(LoopbackPort::unwired());
        framer.enable(0).unwrap();
        let mut buf = [0u8; 8];
        let err = framer.receive(&mut buf, 8).unwrap_err();
        assert!(matches!(err, FrameError::RecvTimeout(8)));
    }

    #[test]
    fn split_send_roundtrip() {
        let mut framer = wired_framer();
        framer.split_start(b"head", 12, 1, WAIT).unwrap();
        framer.split_next(b"body", WAIT).unwrap();
        framer.split_end(b"tail", WAIT).unwrap();

        let mut buf = [0u8; 16];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, len), (1, 12));
        assert_eq!(&buf[..12], b"headbodytail");
    }

    #[test]
    fn split_with_empty_first_chunk() {
        let mut framer = wired_framer();
        framer.split_start(&[], 3, 0, WAIT).unwrap();
        framer.split_end(b"abc", WAIT).unwrap();

        let mut buf = [0u8; 8];
        let (ch, len) = framer.receive(&mut buf, WAIT).unwrap();
        assert_eq!((ch, len), (0, 3));
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn split_length_mismatch_rejected() {
        let mut framer = wired_framer();
        framer.split_start(b"ab", 8, 0, WAIT).unwrap();
        let err = framer.split_end(b"c", WAIT).unwrap_err();
        assert!(matches!(
            err,
            FrameError::SplitLength { sent: 1, total: 6 }
        ));
    }

    #[test]
    fn split_continuation_without_start_rejected() {
        let mut framer = wired_framer();
        assert!(matches!(
            framer.split_next(b"x", WAIT),
            Err(FrameError::SplitNotStarted)
        ));
        assert!(matches!(
            framer.split_end(b"x", WAIT),
            Err(FrameError::SplitNotStarted)
        ));
    }
}
