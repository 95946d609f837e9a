use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};

use crate::error::{ProtoError, Result};

/// Module system state, as reported in the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SysState {
    /// Booting, not yet accepting commands.
    Init = 0,
    /// Up, not associated to a network.
    Idle = 1,
    /// Association in progress.
    Associating = 2,
    /// Network scan in progress.
    Scanning = 3,
    /// Associated, sockets usable.
    Ready = 4,
    /// Bridging a socket transparently.
    Transparent = 5,
}

impl TryFrom<u8> for SysState {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => SysState::Init,
            1 => SysState::Idle,
            2 => SysState::Associating,
            3 => SysState::Scanning,
            4 => SysState::Ready,
            5 => SysState::Transparent,
            other => {
                return Err(ProtoError::BadValue {
                    what: "system state",
                    value: other.into(),
                })
            }
        })
    }
}

/// Decoded system status word.
///
/// Wire layout, 4 bytes: state, flag bits (0 online, 1 config valid,
/// 2 time synced), and a big-endian per-channel pending-event bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysStatus {
    pub state: SysState,
    /// Connected to a network.
    pub online: bool,
    /// Stored configuration is valid.
    pub cfg_ok: bool,
    /// Date and time have been synchronized.
    pub dt_ok: bool,
    /// Per-channel pending-event bitmap (bit n = channel n).
    pub ch_ev: u16,
}

impl SysStatus {
    pub const WIRE_LEN: usize = 4;

    pub fn from_bytes(raw: [u8; 4]) -> Result<Self> {
        Ok(Self {
            state: SysState::try_from(raw[0])?,
            online: raw[1] & 0x01 != 0,
            cfg_ok: raw[1] & 0x02 != 0,
            dt_ok: raw[1] & 0x04 != 0,
            ch_ev: u16::from_be_bytes([raw[2], raw[3]]),
        })
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let flags = u8::from(self.online)
            | u8::from(self.cfg_ok) << 1
            | u8::from(self.dt_ok) << 2;
        let ev = self.ch_ev.to_be_bytes();
        [self.state as u8, flags, ev[0], ev[1]]
    }
}

/// Socket state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SockState {
    /// No socket on the channel.
    None = 0,
    /// TCP socket bound and listening.
    TcpListening = 1,
    /// TCP connection established.
    TcpEstablished = 2,
    /// UDP socket ready.
    UdpReady = 3,
}

impl TryFrom<u8> for SockState {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => SockState::None,
            1 => SockState::TcpListening,
            2 => SockState::TcpEstablished,
            3 => SockState::UdpReady,
            other => {
                return Err(ProtoError::BadValue {
                    what: "socket state",
                    value: other.into(),
                })
            }
        })
    }
}

/// Access-point security mode of a scan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    /// A mode this crate does not know about.
    Unknown(u8),
}

impl From<u8> for AuthMode {
    fn from(value: u8) -> Self {
        match value {
            0 => AuthMode::Open,
            1 => AuthMode::Wep,
            2 => AuthMode::WpaPsk,
            3 => AuthMode::Wpa2Psk,
            4 => AuthMode::WpaWpa2Psk,
            other => AuthMode::Unknown(other),
        }
    }
}

impl AuthMode {
    pub fn code(self) -> u8 {
        match self {
            AuthMode::Open => 0,
            AuthMode::Wep => 1,
            AuthMode::WpaPsk => 2,
            AuthMode::Wpa2Psk => 3,
            AuthMode::WpaWpa2Psk => 4,
            AuthMode::Unknown(v) => v,
        }
    }
}

/// One access point from a scan reply.
///
/// Wire layout: `auth u8 | channel u8 | rssi i8 | ssid_len u8 | ssid`,
/// entries back to back with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEntry<'a> {
    pub auth: AuthMode,
    pub channel: u8,
    /// Signal strength in dBm.
    pub rssi: i8,
    /// SSID bytes, not NUL-terminated.
    pub ssid: &'a [u8],
}

const SCAN_ENTRY_HDR: usize = 4;

/// Walk one entry of a scan reply.
///
/// Returns the entry at `pos` plus the offset of the next entry, or `None`
/// exactly when `pos` equals the data length. A truncated final entry is an
/// error.
pub fn scan_entry_at(data: &[u8], pos: usize) -> Result<Option<(ScanEntry<'_>, usize)>> {
    if pos == data.len() {
        return Ok(None);
    }
    if pos > data.len() || data.len() - pos < SCAN_ENTRY_HDR {
        return Err(ProtoError::ScanTruncated(pos));
    }
    let ssid_len = usize::from(data[pos + 3]);
    let next = pos + SCAN_ENTRY_HDR + ssid_len;
    if next > data.len() {
        return Err(ProtoError::ScanTruncated(pos));
    }
    let entry = ScanEntry {
        auth: AuthMode::from(data[pos]),
        channel: data[pos + 1],
        rssi: data[pos + 2] as i8,
        ssid: &data[pos + SCAN_ENTRY_HDR..next],
    };
    Ok(Some((entry, next)))
}

/// Iterator over the entries of a scan reply.
pub struct ScanIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ScanIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for ScanIter<'a> {
    type Item = Result<ScanEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match scan_entry_at(self.data, self.pos) {
            Ok(Some((entry, next))) => {
                self.pos = next;
                Some(Ok(entry))
            }
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// IPv4 configuration block.
///
/// Wire layout, 24 bytes: slot index, 3 reserved bytes, then address, mask,
/// gateway and both name servers as raw octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpConfig {
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns1: Ipv4Addr,
    pub dns2: Ipv4Addr,
}

impl IpConfig {
    pub const WIRE_LEN: usize = 24;

    /// An all-zero configuration, requesting a DHCP lease.
    pub fn dhcp() -> Self {
        let zero = Ipv4Addr::UNSPECIFIED;
        Self {
            addr: zero,
            mask: zero,
            gateway: zero,
            dns1: zero,
            dns2: zero,
        }
    }

    pub fn put(&self, index: u8, w: &mut impl BufMut) {
        w.put_u8(index);
        w.put_bytes(0, 3);
        for ip in [self.addr, self.mask, self.gateway, self.dns1, self.dns2] {
            w.put_slice(&ip.octets());
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::WIRE_LEN {
            return Err(ProtoError::Truncated {
                len: payload.len(),
                need: Self::WIRE_LEN,
            });
        }
        let mut p = &payload[4..];
        let mut next = || {
            let ip = Ipv4Addr::new(p[0], p[1], p[2], p[3]);
            p.advance(4);
            ip
        };
        Ok(Self {
            addr: next(),
            mask: next(),
            gateway: next(),
            dns1: next(),
            dns2: next(),
        })
    }
}

/// Stored access-point credentials, as returned by a configuration read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    pub ssid: String,
    pub pass: String,
}

/// HTTP request method for the HTTP session surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HttpMethod {
    Get = 0,
    Head = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Connect = 5,
    Options = 6,
    Trace = 7,
}

impl TryFrom<u8> for HttpMethod {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => HttpMethod::Get,
            1 => HttpMethod::Head,
            2 => HttpMethod::Post,
            3 => HttpMethod::Put,
            4 => HttpMethod::Delete,
            5 => HttpMethod::Connect,
            6 => HttpMethod::Options,
            7 => HttpMethod::Trace,
            other => {
                return Err(ProtoError::BadValue {
                    what: "http method",
                    value: other.into(),
                })
            }
        })
    }
}

/// Time-sync service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SntpConfig {
    /// Update period in seconds.
    pub up_delay: u16,
    /// Time zone offset in hours.
    pub timezone: i8,
    /// Apply the one-hour daylight-saving offset.
    pub dst: bool,
    /// Up to three server names.
    pub servers: Vec<String>,
}

/// Date and time reply: a binary stamp plus the module's textual rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTime {
    /// Seconds since the epoch.
    pub stamp: u64,
    pub text: String,
}

/// Prefix a UDP payload with its peer address for a reuse-mode channel.
///
/// Wire layout: 4 address octets, big-endian port, then the payload.
/// Returns the packed length.
pub fn pack_datagram(
    addr: Ipv4Addr,
    port: u16,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize> {
    let need = 6 + payload.len();
    if out.len() < need {
        return Err(ProtoError::BufferTooShort {
            len: out.len(),
            need,
        });
    }
    let mut w = &mut out[..need];
    w.put_slice(&addr.octets());
    w.put_u16(port);
    w.put_slice(payload);
    Ok(need)
}

/// Split a reuse-mode datagram into its peer address, port and payload.
pub fn unpack_datagram(data: &[u8]) -> Result<(Ipv4Addr, u16, &[u8])> {
    if data.len() < 6 {
        return Err(ProtoError::Truncated {
            len: data.len(),
            need: 6,
        });
    }
    let addr = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
    let port = u16::from_be_bytes([data[4], data[5]]);
    Ok((addr, port, &data[6..]))
}

/// Read a NUL-terminated string field, tolerating a full unterminated field.
pub(crate) fn trimmed_str(field: &[u8], name: &'static str) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| ProtoError::InvalidUtf8(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sys_status_roundtrip() {
        let st = SysStatus {
            state: SysState::Ready,
            online: true,
            cfg_ok: true,
            dt_ok: false,
            ch_ev: 0b0000_0110,
        };
        assert_eq!(SysStatus::from_bytes(st.to_bytes()).unwrap(), st);
    }

    #[test]
    fn sys_status_rejects_unknown_state() {
        let err = SysStatus::from_bytes([9, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtoError::BadValue { value: 9, .. }));
    }

    #[test]
    fn scan_walk_two_entries() {
        // Entry A: WPA2, channel 6, -40 dBm, "Home".
        // Entry B: open, channel 1, -70 dBm, "Guest".
        let mut data = vec![3, 6, (-40i8) as u8, 4];
        data.extend_from_slice(b"Home");
        data.extend_from_slice(&[0, 1, (-70i8) as u8, 5]);
        data.extend_from_slice(b"Guest");

        let (a, next) = scan_entry_at(&data, 0).unwrap().unwrap();
        assert_eq!(a.auth, AuthMode::Wpa2Psk);
        assert_eq!(a.channel, 6);
        assert_eq!(a.rssi, -40);
        assert_eq!(a.ssid, b"Home");
        assert_eq!(next, 8);

        let (b, end) = scan_entry_at(&data, next).unwrap().unwrap();
        assert_eq!(b.auth, AuthMode::Open);
        assert_eq!(b.channel, 1);
        assert_eq!(b.rssi, -70);
        assert_eq!(b.ssid, b"Guest");
        assert_eq!(end, data.len());

        assert!(scan_entry_at(&data, end).unwrap().is_none());
    }

    #[test]
    fn scan_walk_rejects_truncated_entry() {
        let mut data = vec![3, 6, 0xD8, 4];
        data.extend_from_slice(b"Home");
        // Second entry declares a 9-byte SSID but only 2 bytes follow.
        data.extend_from_slice(&[0, 1, 0xBA, 9, b'G', b'u']);

        let (_, next) = scan_entry_at(&data, 0).unwrap().unwrap();
        let err = scan_entry_at(&data, next).unwrap_err();
        assert_eq!(err, ProtoError::ScanTruncated(next));
    }

    #[test]
    fn scan_iter_collects_entries() {
        let mut data = vec![0, 11, 0xC0, 1, b'a'];
        data.extend_from_slice(&[2, 3, 0xC5, 2, b'b', b'c']);

        let names: Vec<&[u8]> = ScanIter::new(&data)
            .map(|e| e.unwrap().ssid)
            .collect();
        assert_eq!(names, [b"a".as_ref(), b"bc".as_ref()]);
    }

    #[test]
    fn ip_config_roundtrip() {
        let cfg = IpConfig {
            addr: Ipv4Addr::new(192, 168, 1, 60),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            dns1: Ipv4Addr::new(9, 9, 9, 9),
            dns2: Ipv4Addr::new(1, 1, 1, 1),
        };
        let mut wire = Vec::new();
        cfg.put(2, &mut wire);
        assert_eq!(wire.len(), IpConfig::WIRE_LEN);
        assert_eq!(wire[0], 2);
        assert_eq!(IpConfig::parse(&wire).unwrap(), cfg);
    }

    #[test]
    fn datagram_pack_unpack_recovers_triple() {
        let addr = Ipv4Addr::new(10, 0, 0, 7);
        let mut out = [0u8; 32];
        let n = pack_datagram(addr, 4567, b"payload", &mut out).unwrap();
        assert_eq!(n, 13);

        let (got_addr, got_port, got_payload) = unpack_datagram(&out[..n]).unwrap();
        assert_eq!(got_addr, addr);
        assert_eq!(got_port, 4567);
        assert_eq!(got_payload, b"payload");
    }

    #[test]
    fn datagram_unpack_rejects_short_data() {
        let err = unpack_datagram(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ProtoError::Truncated { len: 3, need: 6 }));
    }

    #[test]
    fn trimmed_str_stops_at_nul() {
        assert_eq!(trimmed_str(b"abc\0\0\0", "f").unwrap(), "abc");
        assert_eq!(trimmed_str(b"full", "f").unwrap(), "full");
    }
}
