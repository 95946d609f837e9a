use std::net::Ipv4Addr;

use airlink_frame::{Framer, CTRL_CHANNEL, MAX_CHANNELS, MAX_PAYLOAD};
use airlink_port::{loopback_self_test, CtrlLine, LinkPort};
use airlink_proto::{
    reply, DateTime, IpConfig, OpCode, ProtoError, Request, SntpConfig, SockState, SysState,
    SysStatus, HEADER_LEN, MIN_CMD_BUFLEN,
};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::scheduler::Scheduler;

/// Access-point and IP configuration slots held by the module.
pub const CFG_SLOTS: u8 = 3;

/// Channel carrying HTTP request and response bodies.
pub const HTTP_CHANNEL: u8 = 3;

/// Handler for frames that arrive on a data channel while the engine is
/// waiting on the control channel.
pub type EventHandler = Box<dyn FnMut(u8, &[u8]) + Send>;

/// Command/reply engine over a framed link.
///
/// Owns the framer, the scheduler and the single shared command buffer.
/// Every operation is synchronous; `&mut self` makes a second in-flight
/// command impossible, so request/reply pairing is strict FIFO by
/// construction.
pub struct Engine<P, S> {
    pub(crate) framer: Framer<P>,
    pub(crate) sched: S,
    pub(crate) cfg: EngineConfig,
    pub(crate) buf: Vec<u8>,
    pub(crate) ready: bool,
    pub(crate) udp_reuse: [bool; MAX_CHANNELS as usize],
    pub(crate) on_event: Option<EventHandler>,
}

impl<P: LinkPort, S: Scheduler> Engine<P, S> {
    /// Wrap a port. The engine is unusable until [`init`](Self::init)
    /// succeeds.
    pub fn new(port: P, sched: S, cfg: EngineConfig) -> Self {
        Self {
            framer: Framer::new(port),
            sched,
            cfg,
            buf: Vec::new(),
            ready: false,
            udp_reuse: [false; MAX_CHANNELS as usize],
            on_event: None,
        }
    }

    /// Install a handler for frames arriving on data channels while a
    /// control exchange is in progress.
    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.on_event = Some(handler);
    }

    /// Mutably borrow the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        self.framer.port_mut()
    }

    /// Bring the link up: reset FIFOs, drive the module's control lines to
    /// the held-in-reset state, run the port loopback self-test and enable
    /// the control channel.
    ///
    /// Every other operation returns [`EngineError::NotReady`] until this
    /// succeeds. Call [`detect`](Self::detect) afterwards to release the
    /// module and confirm it answers.
    pub fn init(&mut self) -> Result<()> {
        if self.cfg.buf_len < MIN_CMD_BUFLEN {
            return Err(EngineError::BufferTooShort {
                len: self.cfg.buf_len,
                min: MIN_CMD_BUFLEN,
            });
        }
        self.buf.resize(self.cfg.buf_len, 0);

        let port = self.framer.port_mut();
        port.reset_fifos();
        port.set_line(CtrlLine::Reset, true);
        port.set_line(CtrlLine::Program, false);
        port.set_line(CtrlLine::PowerDown, false);
        loopback_self_test(port, self.cfg.frame_wait)?;

        self.enable_channel(CTRL_CHANNEL)?;
        self.ready = true;
        debug!(buf_len = self.cfg.buf_len, "engine initialized");
        Ok(())
    }

    /// Hold the module in reset.
    pub fn module_reset(&mut self) {
        self.framer.port_mut().set_line(CtrlLine::Reset, true);
    }

    /// Release the module from reset.
    pub fn module_start(&mut self) {
        self.framer.port_mut().set_line(CtrlLine::Reset, false);
    }

    /// Release the module and poll the version query until it answers.
    ///
    /// The round trip itself never retries; this is the one caller-level
    /// retry loop, bounded by `detect_retries`.
    pub fn detect(&mut self) -> Result<reply::Version> {
        self.check_ready()?;
        self.module_start();

        let retries = self.cfg.detect_retries.max(1);
        let mut last = EngineError::NotReady;
        for attempt in 0..retries {
            match self.version() {
                Ok(version) => {
                    debug!(attempt, major = version.major, minor = version.minor, "module detected");
                    return Ok(version);
                }
                Err(err) => {
                    trace!(attempt, error = %err, "version probe failed");
                    last = err;
                }
            }
            let tick = self.cfg.poll_interval;
            self.sched.sleep(tick);
        }
        Err(last)
    }

    // ---- control-channel round trip ----

    /// Issue one command and wait for its reply.
    ///
    /// Returns the reply frame length in the shared buffer; the payload sits
    /// at `HEADER_LEN..len`. Data-channel frames that arrive while waiting go
    /// to the event handler and the wait resumes.
    pub(crate) fn command(&mut self, req: &Request<'_>) -> Result<usize> {
        self.check_ready()?;
        let wait = self.cfg.frame_wait;
        let n = req.encode(&mut self.buf)?;
        trace!(op = ?req.opcode(), len = n, "command");
        self.framer
            .send(&self.buf[..n], CTRL_CHANNEL, wait)
            .map_err(EngineError::Send)?;
        self.wait_reply(wait)
    }

    pub(crate) fn wait_reply(&mut self, wait: u32) -> Result<usize> {
        loop {
            let (ch, len) = self
                .framer
                .receive(&mut self.buf, wait)
                .map_err(EngineError::Recv)?;
            if ch == CTRL_CHANNEL {
                let (op, _) = reply::header(&self.buf[..len])?;
                return match op {
                    OpCode::Ok => Ok(len),
                    OpCode::Error => Err(EngineError::ErrorReply),
                    other => Err(EngineError::Proto(ProtoError::BadValue {
                        what: "reply opcode",
                        value: other.code().into(),
                    })),
                };
            }
            if let Some(handler) = self.on_event.as_mut() {
                handler(ch, &self.buf[..len]);
            }
        }
    }

    pub(crate) fn payload(&self, len: usize) -> &[u8] {
        &self.buf[HEADER_LEN..len]
    }

    pub(crate) fn check_ready(&self) -> Result<()> {
        if !self.ready {
            return Err(EngineError::NotReady);
        }
        Ok(())
    }

    fn enable_channel(&mut self, ch: u8) -> Result<()> {
        self.framer
            .enable(ch)
            .map_err(|_| EngineError::Param("channel out of range"))
    }

    fn check_sock_channel(ch: u8) -> Result<()> {
        if ch == CTRL_CHANNEL || ch >= MAX_CHANNELS {
            return Err(EngineError::Param("socket channel out of range"));
        }
        Ok(())
    }

    // ---- module queries ----

    /// Firmware version and variant.
    pub fn version(&mut self) -> Result<reply::Version> {
        let len = self.command(&Request::Version)?;
        Ok(reply::version(self.payload(len))?)
    }

    /// Round-trip a payload through the module.
    pub fn echo(&mut self, data: &[u8]) -> Result<&[u8]> {
        let len = self.command(&Request::Echo(data))?;
        Ok(self.payload(len))
    }

    /// System status word.
    pub fn sys_status(&mut self) -> Result<SysStatus> {
        let len = self.command(&Request::SysStat)?;
        Ok(reply::sys_status(self.payload(len))?)
    }

    /// Socket state of a channel.
    pub fn sock_status(&mut self, ch: u8) -> Result<SockState> {
        Self::check_sock_channel(ch)?;
        let len = self.command(&Request::SockStat { ch })?;
        Ok(reply::sock_status(self.payload(len))?)
    }

    /// Fetch hardware random bytes.
    pub fn random(&mut self, len: u16) -> Result<&[u8]> {
        let reply_len = self.command(&Request::RandomGet { len })?;
        Ok(self.payload(reply_len))
    }

    /// Write a line to the module debug console.
    pub fn log(&mut self, text: &str) -> Result<()> {
        self.command(&Request::Log(text.as_bytes()))?;
        Ok(())
    }

    /// Restore the default configuration.
    pub fn default_cfg_set(&mut self) -> Result<()> {
        self.command(&Request::DefCfgSet)?;
        Ok(())
    }

    /// Full factory reset.
    pub fn factory_reset(&mut self) -> Result<()> {
        self.command(&Request::FactoryReset)?;
        Ok(())
    }

    /// Put the module into low-power sleep. Only a reset wakes it.
    pub fn sleep_set(&mut self) -> Result<()> {
        self.command(&Request::Sleep)?;
        Ok(())
    }

    // ---- time ----

    /// Module date and time.
    pub fn datetime(&mut self) -> Result<DateTime> {
        let len = self.command(&Request::Datetime)?;
        Ok(reply::datetime(self.payload(len))?)
    }

    /// Configure the time-sync service.
    pub fn sntp_cfg_set(&mut self, cfg: &SntpConfig) -> Result<()> {
        let servers: Vec<&str> = cfg.servers.iter().map(String::as_str).collect();
        self.command(&Request::SntpCfgSet {
            up_delay: cfg.up_delay,
            timezone: cfg.timezone,
            dst: cfg.dst,
            servers: &servers,
        })?;
        Ok(())
    }

    /// Read the time-sync configuration.
    pub fn sntp_cfg_get(&mut self) -> Result<SntpConfig> {
        let len = self.command(&Request::SntpCfgGet)?;
        Ok(reply::sntp_config(self.payload(len))?)
    }

    // ---- flash ----

    /// Write module flash at an address.
    pub fn flash_write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.command(&Request::FlashWrite { addr, data })?;
        Ok(())
    }

    /// Read module flash.
    pub fn flash_read(&mut self, addr: u32, len: u16) -> Result<&[u8]> {
        let reply_len = self.command(&Request::FlashRead { addr, len })?;
        Ok(self.payload(reply_len))
    }

    /// Erase one flash sector.
    pub fn flash_erase(&mut self, sector: u16) -> Result<()> {
        self.command(&Request::FlashErase { sector })?;
        Ok(())
    }

    /// Flash chip identifier: manufacturer byte plus device word.
    pub fn flash_id(&mut self) -> Result<(u8, u16)> {
        let len = self.command(&Request::FlashId)?;
        Ok(reply::flash_id(self.payload(len))?)
    }

    // ---- network configuration ----

    /// Store access-point credentials in a configuration slot.
    pub fn ap_cfg_set(&mut self, index: u8, ssid: &str, pass: &str) -> Result<()> {
        Self::check_slot(index)?;
        self.command(&Request::ApCfgSet { index, ssid, pass })?;
        Ok(())
    }

    /// Read the access-point credentials of a configuration slot.
    pub fn ap_cfg_get(&mut self, index: u8) -> Result<airlink_proto::ApConfig> {
        Self::check_slot(index)?;
        let len = self.command(&Request::ApCfgGet { index })?;
        let (_, cfg) = reply::ap_config(self.payload(len))?;
        Ok(cfg)
    }

    /// Store an IPv4 configuration slot. [`IpConfig::dhcp`] requests a lease.
    pub fn ip_cfg_set(&mut self, index: u8, cfg: IpConfig) -> Result<()> {
        Self::check_slot(index)?;
        self.command(&Request::IpCfgSet { index, cfg })?;
        Ok(())
    }

    /// Read an IPv4 configuration slot.
    pub fn ip_cfg_get(&mut self, index: u8) -> Result<IpConfig> {
        Self::check_slot(index)?;
        let len = self.command(&Request::IpCfgGet { index })?;
        Ok(IpConfig::parse(self.payload(len))?)
    }

    /// Read the currently leased IPv4 configuration.
    pub fn ip_current(&mut self) -> Result<IpConfig> {
        let len = self.command(&Request::IpCurrent)?;
        Ok(IpConfig::parse(self.payload(len))?)
    }

    /// Scan for access points.
    ///
    /// Returns the raw entry blob borrowed from the shared buffer; walk it
    /// with [`airlink_proto::ScanIter`].
    pub fn ap_scan(&mut self) -> Result<&[u8]> {
        let len = self.command(&Request::ApScan)?;
        Ok(self.payload(len))
    }

    /// Join the access point of a configuration slot.
    pub fn ap_join(&mut self, index: u8) -> Result<()> {
        Self::check_slot(index)?;
        self.command(&Request::ApJoin { index })?;
        Ok(())
    }

    /// Leave the joined access point.
    pub fn ap_leave(&mut self) -> Result<()> {
        self.command(&Request::ApLeave)?;
        Ok(())
    }

    /// Poll the system status until the module reaches the associated state.
    ///
    /// One status query per tick, `poll_interval` between ticks. Resolves
    /// `false` when the budget runs out; budget exhaustion is not an error.
    pub fn assoc_wait(&mut self, tries: u32) -> Result<bool> {
        for _ in 0..tries {
            let status = self.sys_status()?;
            if status.state >= SysState::Ready {
                return Ok(true);
            }
            let tick = self.cfg.poll_interval;
            self.sched.sleep(tick);
        }
        Ok(false)
    }

    // ---- sockets ----

    /// Open a TCP client connection on a channel. `src_port` 0 selects
    /// automatic allocation. Enables the channel on success; establishment is
    /// confirmed with [`sock_conn_wait`](Self::sock_conn_wait).
    pub fn tcp_connect(&mut self, ch: u8, dst_addr: &str, dst_port: u16, src_port: u16) -> Result<()> {
        Self::check_sock_channel(ch)?;
        self.command(&Request::TcpConnect {
            ch,
            dst_addr,
            dst_port,
            src_port,
        })?;
        self.enable_channel(ch)
    }

    /// Bind and listen on a TCP port. Enables the channel on success.
    pub fn tcp_bind(&mut self, ch: u8, port: u16) -> Result<()> {
        Self::check_sock_channel(ch)?;
        self.command(&Request::TcpBind { ch, port })?;
        self.enable_channel(ch)
    }

    /// Close the socket of a channel and disable the channel.
    pub fn close(&mut self, ch: u8) -> Result<()> {
        Self::check_sock_channel(ch)?;
        self.command(&Request::Close { ch })?;
        self.udp_reuse[ch as usize] = false;
        self.framer
            .disable(ch)
            .map_err(|_| EngineError::Param("channel out of range"))
    }

    /// Configure a UDP socket on a channel. `peer = None` selects reuse
    /// mode, where each datagram carries its own peer address. Enables the
    /// channel on success.
    pub fn udp_set(&mut self, ch: u8, peer: Option<(&str, u16)>, src_port: u16) -> Result<()> {
        Self::check_sock_channel(ch)?;
        self.command(&Request::UdpSet { ch, peer, src_port })?;
        self.udp_reuse[ch as usize] = peer.is_none();
        self.enable_channel(ch)
    }

    /// Poll a channel's socket state until the TCP connection is
    /// established. Same contract as [`assoc_wait`](Self::assoc_wait).
    pub fn sock_conn_wait(&mut self, ch: u8, tries: u32) -> Result<bool> {
        for _ in 0..tries {
            if self.sock_status(ch)? == SockState::TcpEstablished {
                return Ok(true);
            }
            let tick = self.cfg.poll_interval;
            self.sched.sleep(tick);
        }
        Ok(false)
    }

    // ---- bulk transfer ----

    /// Send payload bytes on a data channel, chunked to the command-buffer
    /// size, one frame per chunk.
    ///
    /// `max_wait == 0` waits indefinitely; callers opting in accept that a
    /// dead link then hangs the call.
    pub fn send(&mut self, ch: u8, data: &[u8], max_wait: u32) -> Result<usize> {
        self.check_ready()?;
        Self::check_sock_channel(ch)?;
        let wait = normalize_wait(max_wait);
        let chunk_len = self.cfg.buf_len.min(MAX_PAYLOAD);

        if data.is_empty() {
            self.framer.send(data, ch, wait).map_err(EngineError::Send)?;
            return Ok(0);
        }
        for chunk in data.chunks(chunk_len) {
            self.framer.send(chunk, ch, wait).map_err(EngineError::Send)?;
        }
        Ok(data.len())
    }

    /// Receive one frame from any enabled channel.
    ///
    /// Returns the channel and the payload borrowed from the shared buffer.
    /// `max_wait == 0` waits indefinitely.
    pub fn recv(&mut self, max_wait: u32) -> Result<(u8, &[u8])> {
        self.check_ready()?;
        let wait = normalize_wait(max_wait);
        let (ch, len) = self
            .framer
            .receive(&mut self.buf, wait)
            .map_err(EngineError::Recv)?;
        Ok((ch, &self.buf[..len]))
    }

    /// Send a datagram on a reuse-mode UDP channel, prefixing the peer
    /// address.
    pub fn udp_send_to(
        &mut self,
        ch: u8,
        addr: Ipv4Addr,
        port: u16,
        payload: &[u8],
        max_wait: u32,
    ) -> Result<usize> {
        self.check_ready()?;
        self.check_reuse(ch)?;
        let wait = normalize_wait(max_wait);
        let n = airlink_proto::pack_datagram(addr, port, payload, &mut self.buf)?;
        self.framer
            .send(&self.buf[..n], ch, wait)
            .map_err(EngineError::Send)?;
        Ok(payload.len())
    }

    /// Receive a datagram from a reuse-mode UDP channel, stripping the peer
    /// address prefix. Frames arriving on other channels go to the event
    /// handler and the wait resumes.
    pub fn udp_recv_from(&mut self, ch: u8, max_wait: u32) -> Result<(Ipv4Addr, u16, &[u8])> {
        self.check_ready()?;
        self.check_reuse(ch)?;
        let wait = normalize_wait(max_wait);

        let len = loop {
            let (got, len) = self
                .framer
                .receive(&mut self.buf, wait)
                .map_err(EngineError::Recv)?;
            if got == ch {
                break len;
            }
            if let Some(handler) = self.on_event.as_mut() {
                handler(got, &self.buf[..len]);
            }
        };
        Ok(airlink_proto::unpack_datagram(&self.buf[..len])?)
    }

    fn check_reuse(&self, ch: u8) -> Result<()> {
        Self::check_sock_channel(ch)?;
        if !self.udp_reuse[ch as usize] {
            return Err(EngineError::Param("channel is not in UDP reuse mode"));
        }
        Ok(())
    }

    fn check_slot(index: u8) -> Result<()> {
        if index >= CFG_SLOTS {
            return Err(EngineError::Param("configuration slot out of range"));
        }
        Ok(())
    }
}

fn normalize_wait(max_wait: u32) -> u32 {
    if max_wait == 0 {
        u32::MAX
    } else {
        max_wait
    }
}
