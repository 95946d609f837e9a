//! Scripted companion-module simulator.
//!
//! [`ModuleSim`] implements [`LinkPort`] end to end: it deframes the bytes
//! the host transmits, answers control envelopes by opcode and frames its
//! replies back into the receive FIFO. Association and TCP establishment are
//! modeled as poll countdowns so the engine's waiting state machines can be
//! exercised tick by tick.

use std::collections::VecDeque;

use airlink_port::{CtrlLine, LinkPort};
use tracing::trace;

const DELIMITER: u8 = 0x7E;

const OK: u16 = 0;
const ERROR: u16 = 255;

// System states as they appear in the status word.
const ST_IDLE: u8 = 1;
const ST_ASSOCIATING: u8 = 2;
const ST_READY: u8 = 4;

// Socket states.
const SOCK_NONE: u8 = 0;
const SOCK_TCP_LISTEN: u8 = 1;
const SOCK_TCP_EST: u8 = 2;
const SOCK_UDP_READY: u8 = 3;

const FLASH_LEN: usize = 0x8000;
const FLASH_SECTOR: usize = 4096;

const HTTP_CHANNEL: u8 = 3;

#[derive(Debug)]
enum Parse {
    Stx,
    Header,
    LenLow { ch: u8, hi: u8 },
    Payload { ch: u8, len: usize },
    Trailer { ch: u8 },
}

/// In-memory companion module.
pub struct ModuleSim {
    rx: VecDeque<u8>,
    state: Parse,
    data: Vec<u8>,
    loopback: bool,
    lines: [bool; 3],

    version: (u8, u8, u8),
    variant: String,
    scan_blob: Vec<u8>,

    sys_state: u8,
    assoc_delay: u32,
    assoc_left: u32,
    conn_delay: u32,
    conn_left: [u32; 4],
    sock: [u8; 4],

    ap_slots: [Vec<u8>; 3],
    ip_slots: [Vec<u8>; 3],
    sntp: Vec<u8>,
    stamp: u64,
    flash: Vec<u8>,
    rng: u32,

    http_status: u16,
    http_response: Vec<u8>,
    http_body: Vec<u8>,
    http_pending: Option<Vec<u8>>,
    cert_hash: Option<u32>,
    cert_stored: usize,

    sys_stat_polls: u32,
    sock_stat_polls: u32,
}

impl ModuleSim {
    pub fn new() -> Self {
        // Default scan result: one WPA2 and one open network.
        let mut scan_blob = vec![3, 6, (-40i8) as u8, 4];
        scan_blob.extend_from_slice(b"Home");
        scan_blob.extend_from_slice(&[0, 1, (-70i8) as u8, 5]);
        scan_blob.extend_from_slice(b"Guest");

        Self {
            rx: VecDeque::new(),
            state: Parse::Stx,
            data: Vec::new(),
            loopback: false,
            lines: [false; 3],
            version: (1, 5, 0),
            variant: "std".into(),
            scan_blob,
            sys_state: ST_IDLE,
            assoc_delay: 0,
            assoc_left: 0,
            conn_delay: 0,
            conn_left: [0; 4],
            sock: [SOCK_NONE; 4],
            ap_slots: Default::default(),
            ip_slots: Default::default(),
            sntp: vec![0x01, 0x2C, 0, 0, 0],
            stamp: 1_700_000_000,
            flash: vec![0xFF; FLASH_LEN],
            rng: 0x2545_F491,
            http_status: 200,
            http_response: Vec::new(),
            http_body: Vec::new(),
            http_pending: None,
            cert_hash: None,
            cert_stored: 0,
            sys_stat_polls: 0,
            sock_stat_polls: 0,
        }
    }

    /// Status polls an association takes before the module reports Ready.
    /// `u32::MAX` never becomes ready.
    pub fn set_assoc_delay(&mut self, polls: u32) {
        self.assoc_delay = polls;
    }

    /// Socket polls a TCP connection takes before it is established.
    /// `u32::MAX` never establishes.
    pub fn set_conn_delay(&mut self, polls: u32) {
        self.conn_delay = polls;
    }

    /// Replace the scan reply blob.
    pub fn set_scan_blob(&mut self, blob: Vec<u8>) {
        self.scan_blob = blob;
    }

    /// Response the simulated HTTP exchange produces.
    pub fn set_http_response(&mut self, status: u16, body: Vec<u8>) {
        self.http_status = status;
        self.http_response = body;
    }

    /// Request body received on the HTTP channel so far.
    pub fn http_request_body(&self) -> &[u8] {
        &self.http_body
    }

    /// Length of the installed certificate.
    pub fn cert_len(&self) -> usize {
        self.cert_stored
    }

    /// Status queries answered so far.
    pub fn sys_stat_polls(&self) -> u32 {
        self.sys_stat_polls
    }

    /// Socket-status queries answered so far.
    pub fn sock_stat_polls(&self) -> u32 {
        self.sock_stat_polls
    }

    /// Whether a control line is currently asserted.
    pub fn line(&self, line: CtrlLine) -> bool {
        self.lines[line as usize]
    }

    fn feed(&mut self, byte: u8) {
        self.state = match std::mem::replace(&mut self.state, Parse::Stx) {
            Parse::Stx => {
                if byte == DELIMITER {
                    Parse::Header
                } else {
                    Parse::Stx
                }
            }
            Parse::Header => {
                if byte == DELIMITER {
                    // Previous frame's trailer; the real STX is this one.
                    Parse::Header
                } else {
                    Parse::LenLow {
                        ch: byte >> 4,
                        hi: byte & 0x0F,
                    }
                }
            }
            Parse::LenLow { ch, hi } => {
                let len = usize::from(hi) << 8 | usize::from(byte);
                self.data.clear();
                if len == 0 {
                    Parse::Trailer { ch }
                } else {
                    Parse::Payload { ch, len }
                }
            }
            Parse::Payload { ch, len } => {
                self.data.push(byte);
                if self.data.len() == len {
                    Parse::Trailer { ch }
                } else {
                    Parse::Payload { ch, len }
                }
            }
            Parse::Trailer { ch } => {
                if byte == DELIMITER {
                    let frame = std::mem::take(&mut self.data);
                    self.handle_frame(ch, frame);
                }
                Parse::Stx
            }
        };
    }

    fn handle_frame(&mut self, ch: u8, payload: Vec<u8>) {
        trace!(ch, len = payload.len(), "sim frame");
        match ch {
            0 => {
                let reply = self.handle_command(&payload);
                self.push_frame(0, &reply);
                if let Some(body) = self.http_pending.take() {
                    self.push_frame(HTTP_CHANNEL, &body);
                }
            }
            HTTP_CHANNEL => self.http_body.extend_from_slice(&payload),
            // Data channels echo, which preserves any reuse-mode address
            // prefix byte for byte.
            _ => self.push_frame(ch, &payload),
        }
    }

    fn handle_command(&mut self, frame: &[u8]) -> Vec<u8> {
        if frame.len() < 4 {
            return err();
        }
        let op = u16::from_be_bytes([frame[0], frame[1]]);
        let dlen = usize::from(u16::from_be_bytes([frame[2], frame[3]]));
        let Some(body) = frame.get(4..4 + dlen) else {
            return err();
        };

        match op {
            // VERSION
            1 => {
                let mut out = vec![self.version.0, self.version.1, self.version.2];
                out.extend_from_slice(self.variant.as_bytes());
                ok(&out)
            }
            // ECHO
            2 => ok(body),
            // AP_SCAN
            3 => ok(&self.scan_blob),
            // AP_CFG
            4 => match body.first() {
                Some(&index) if usize::from(index) < self.ap_slots.len() && body.len() == 97 => {
                    self.ap_slots[usize::from(index)] = body.to_vec();
                    ok(&[])
                }
                _ => err(),
            },
            // AP_CFG_GET
            5 => match body.first() {
                Some(&index) if usize::from(index) < self.ap_slots.len() => {
                    let slot = &self.ap_slots[usize::from(index)];
                    if slot.is_empty() {
                        let mut empty = vec![0u8; 97];
                        empty[0] = index;
                        ok(&empty)
                    } else {
                        ok(slot)
                    }
                }
                _ => err(),
            },
            // IP_CURRENT
            6 => {
                let mut out = vec![0u8; 4];
                out.extend_from_slice(&[192, 168, 1, 60]);
                out.extend_from_slice(&[255, 255, 255, 0]);
                out.extend_from_slice(&[192, 168, 1, 1]);
                out.extend_from_slice(&[9, 9, 9, 9]);
                out.extend_from_slice(&[1, 1, 1, 1]);
                ok(&out)
            }
            // IP_CFG
            7 => match body.first() {
                Some(&index) if usize::from(index) < self.ip_slots.len() && body.len() == 24 => {
                    self.ip_slots[usize::from(index)] = body.to_vec();
                    ok(&[])
                }
                _ => err(),
            },
            // IP_CFG_GET
            8 => match body.first() {
                Some(&index) if usize::from(index) < self.ip_slots.len() => {
                    let slot = &self.ip_slots[usize::from(index)];
                    if slot.is_empty() {
                        let mut empty = vec![0u8; 24];
                        empty[0] = index;
                        ok(&empty)
                    } else {
                        ok(slot)
                    }
                }
                _ => err(),
            },
            // AP_JOIN
            9 => {
                self.sys_state = ST_ASSOCIATING;
                self.assoc_left = self.assoc_delay;
                ok(&[])
            }
            // AP_LEAVE
            10 => {
                self.sys_state = ST_IDLE;
                ok(&[])
            }
            // TCP_CON
            11 => match body.get(12) {
                Some(&ch) if usize::from(ch) < self.sock.len() => {
                    self.conn_left[usize::from(ch)] = self.conn_delay;
                    if self.conn_delay == 0 {
                        self.sock[usize::from(ch)] = SOCK_TCP_EST;
                    }
                    ok(&[])
                }
                _ => err(),
            },
            // TCP_BIND
            12 => match body.get(6) {
                Some(&ch) if usize::from(ch) < self.sock.len() => {
                    self.sock[usize::from(ch)] = SOCK_TCP_LISTEN;
                    ok(&[])
                }
                _ => err(),
            },
            // CLOSE
            13 => match body.first() {
                Some(&ch) if usize::from(ch) < self.sock.len() => {
                    self.sock[usize::from(ch)] = SOCK_NONE;
                    ok(&[])
                }
                _ => err(),
            },
            // UDP_SET
            14 => match body.get(12) {
                Some(&ch) if usize::from(ch) < self.sock.len() => {
                    self.sock[usize::from(ch)] = SOCK_UDP_READY;
                    ok(&[])
                }
                _ => err(),
            },
            // SOCK_STAT
            15 => match body.first() {
                Some(&ch) if usize::from(ch) < self.sock.len() => {
                    let ch = usize::from(ch);
                    self.sock_stat_polls += 1;
                    if self.conn_left[ch] > 0 {
                        self.conn_left[ch] = self.conn_left[ch].saturating_sub(1);
                        if self.conn_left[ch] == 0 {
                            self.sock[ch] = SOCK_TCP_EST;
                        }
                    }
                    ok(&[self.sock[ch]])
                }
                _ => err(),
            },
            // SNTP_CFG
            16 => {
                self.sntp = body.to_vec();
                ok(&[])
            }
            // SNTP_CFG_GET
            17 => ok(&self.sntp),
            // DATETIME
            18 => {
                let mut out = self.stamp.to_be_bytes().to_vec();
                out.extend_from_slice(b"Tue Nov 14 22:13:20 2023\0");
                ok(&out)
            }
            // FLASH_WRITE
            19 => {
                if body.len() < 4 {
                    return err();
                }
                let addr = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
                let data = &body[4..];
                match self.flash.get_mut(addr..addr + data.len()) {
                    Some(slot) => {
                        slot.copy_from_slice(data);
                        ok(&[])
                    }
                    None => err(),
                }
            }
            // FLASH_READ
            20 => {
                if body.len() < 6 {
                    return err();
                }
                let addr = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
                let len = usize::from(u16::from_be_bytes([body[4], body[5]]));
                match self.flash.get(addr..addr + len) {
                    Some(data) => ok(data),
                    None => err(),
                }
            }
            // FLASH_ERASE
            21 => {
                if body.len() < 2 {
                    return err();
                }
                let sector = usize::from(u16::from_be_bytes([body[0], body[1]]));
                let start = sector * FLASH_SECTOR;
                match self.flash.get_mut(start..start + FLASH_SECTOR) {
                    Some(slot) => {
                        slot.fill(0xFF);
                        ok(&[])
                    }
                    None => err(),
                }
            }
            // FLASH_ID
            22 => ok(&[0xEF, 0x40, 0x16]),
            // SYS_STAT
            23 => {
                self.sys_stat_polls += 1;
                if self.sys_state == ST_ASSOCIATING {
                    if self.assoc_left == 0 {
                        self.sys_state = ST_READY;
                    } else {
                        self.assoc_left -= 1;
                    }
                }
                let online = u8::from(self.sys_state >= ST_READY);
                ok(&[self.sys_state, online | 0x02 | 0x04, 0, 0])
            }
            // DEF_CFG_SET and FACTORY_RESET
            24 | 27 => {
                self.ap_slots = Default::default();
                self.ip_slots = Default::default();
                self.cert_hash = None;
                self.cert_stored = 0;
                ok(&[])
            }
            // RANDOM_GET
            25 => {
                if body.len() < 2 {
                    return err();
                }
                let len = usize::from(u16::from_be_bytes([body[0], body[1]]));
                let out: Vec<u8> = (0..len).map(|_| self.next_rand()).collect();
                ok(&out)
            }
            // LOG, SLEEP, HTTP_URL_SET, HTTP_METHOD_SET, HTTP_HDR_ADD,
            // HTTP_HDR_DEL
            26 | 28 | 29 | 30 | 31 | 32 => ok(&[]),
            // HTTP_OPEN
            33 => {
                self.http_body.clear();
                ok(&[])
            }
            // HTTP_FINISH
            34 => {
                let mut out = self.http_status.to_be_bytes().to_vec();
                out.extend_from_slice(&(self.http_response.len() as u32).to_be_bytes());
                // Response body follows the reply on the HTTP channel.
                self.http_pending = Some(self.http_response.clone());
                ok(&out)
            }
            // HTTP_CERT_QUERY
            35 => match self.cert_hash {
                Some(hash) => ok(&hash.to_be_bytes()),
                None => err(),
            },
            // HTTP_CERT_SET
            36 => {
                if body.len() < 6 {
                    return err();
                }
                let hash = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let clen = usize::from(u16::from_be_bytes([body[4], body[5]]));
                if body.len() - 6 != clen {
                    return err();
                }
                self.cert_hash = Some(hash);
                self.cert_stored = clen;
                ok(&[])
            }
            _ => err(),
        }
    }

    fn push_frame(&mut self, ch: u8, payload: &[u8]) {
        self.rx.push_back(DELIMITER);
        self.rx.push_back(ch << 4 | (payload.len() >> 8) as u8);
        self.rx.push_back((payload.len() & 0xFF) as u8);
        self.rx.extend(payload);
        self.rx.push_back(DELIMITER);
    }

    fn next_rand(&mut self) -> u8 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;
        self.rng as u8
    }
}

fn ok(payload: &[u8]) -> Vec<u8> {
    let mut out = OK.to_be_bytes().to_vec();
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn err() -> Vec<u8> {
    let mut out = ERROR.to_be_bytes().to_vec();
    out.extend_from_slice(&[0, 0]);
    out
}

impl Default for ModuleSim {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPort for ModuleSim {
    fn tx_ready(&self) -> bool {
        true
    }

    fn put(&mut self, byte: u8) {
        if self.loopback {
            self.rx.push_back(byte);
        } else {
            self.feed(byte);
        }
    }

    fn rx_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    fn get(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }

    fn tx_fifo_len(&self) -> usize {
        128
    }

    fn reset_fifos(&mut self) {
        self.rx.clear();
        self.data.clear();
        self.state = Parse::Stx;
    }

    fn set_line(&mut self, line: CtrlLine, asserted: bool) {
        self.lines[line as usize] = asserted;
    }

    fn set_loopback(&mut self, on: bool) {
        self.loopback = on;
    }
}
