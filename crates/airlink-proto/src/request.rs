use bytes::BufMut;

use crate::error::{ProtoError, Result};
use crate::opcode::OpCode;
use crate::types::{HttpMethod, IpConfig};
use crate::{HEADER_LEN, NTP_POOL_MAXLEN, NTP_SERVER_SLOTS, PASS_MAXLEN, PORT_STR_LEN, SSID_MAXLEN};

/// Fixed part of the socket-address payload: two port fields and a channel.
const IN_ADDR_FIXED: usize = 2 * PORT_STR_LEN + 1;

/// A request envelope, keyed by opcode.
///
/// Requests borrow their argument data; [`encode`](Request::encode) writes the
/// complete envelope (header plus payload) into a caller-supplied buffer.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
    Version,
    Echo(&'a [u8]),
    ApScan,
    ApCfgSet {
        index: u8,
        ssid: &'a str,
        pass: &'a str,
    },
    ApCfgGet {
        index: u8,
    },
    IpCurrent,
    IpCfgSet {
        index: u8,
        cfg: IpConfig,
    },
    IpCfgGet {
        index: u8,
    },
    ApJoin {
        index: u8,
    },
    ApLeave,
    TcpConnect {
        ch: u8,
        dst_addr: &'a str,
        dst_port: u16,
        /// 0 selects automatic source-port allocation.
        src_port: u16,
    },
    TcpBind {
        ch: u8,
        port: u16,
    },
    Close {
        ch: u8,
    },
    UdpSet {
        ch: u8,
        /// `None` selects reuse mode: the peer address travels inside each
        /// datagram instead of being fixed here.
        peer: Option<(&'a str, u16)>,
        src_port: u16,
    },
    SockStat {
        ch: u8,
    },
    SntpCfgSet {
        up_delay: u16,
        timezone: i8,
        dst: bool,
        servers: &'a [&'a str],
    },
    SntpCfgGet,
    Datetime,
    FlashWrite {
        addr: u32,
        data: &'a [u8],
    },
    FlashRead {
        addr: u32,
        len: u16,
    },
    FlashErase {
        sector: u16,
    },
    FlashId,
    SysStat,
    DefCfgSet,
    RandomGet {
        len: u16,
    },
    Log(&'a [u8]),
    FactoryReset,
    Sleep,
    HttpUrlSet(&'a str),
    HttpMethodSet(HttpMethod),
    HttpHdrAdd(&'a str),
    HttpHdrDel(&'a str),
    HttpOpen {
        content_len: u32,
    },
    HttpFinish,
    HttpCertQuery,
    HttpCertSet {
        hash: u32,
        cert: &'a [u8],
    },
}

impl Request<'_> {
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::Version => OpCode::Version,
            Request::Echo(_) => OpCode::Echo,
            Request::ApScan => OpCode::ApScan,
            Request::ApCfgSet { .. } => OpCode::ApCfg,
            Request::ApCfgGet { .. } => OpCode::ApCfgGet,
            Request::IpCurrent => OpCode::IpCurrent,
            Request::IpCfgSet { .. } => OpCode::IpCfg,
            Request::IpCfgGet { .. } => OpCode::IpCfgGet,
            Request::ApJoin { .. } => OpCode::ApJoin,
            Request::ApLeave => OpCode::ApLeave,
            Request::TcpConnect { .. } => OpCode::TcpCon,
            Request::TcpBind { .. } => OpCode::TcpBind,
            Request::Close { .. } => OpCode::Close,
            Request::UdpSet { .. } => OpCode::UdpSet,
            Request::SockStat { .. } => OpCode::SockStat,
            Request::SntpCfgSet { .. } => OpCode::SntpCfg,
            Request::SntpCfgGet => OpCode::SntpCfgGet,
            Request::Datetime => OpCode::Datetime,
            Request::FlashWrite { .. } => OpCode::FlashWrite,
            Request::FlashRead { .. } => OpCode::FlashRead,
            Request::FlashErase { .. } => OpCode::FlashErase,
            Request::FlashId => OpCode::FlashId,
            Request::SysStat => OpCode::SysStat,
            Request::DefCfgSet => OpCode::DefCfgSet,
            Request::RandomGet { .. } => OpCode::RandomGet,
            Request::Log(_) => OpCode::Log,
            Request::FactoryReset => OpCode::FactoryReset,
            Request::Sleep => OpCode::Sleep,
            Request::HttpUrlSet(_) => OpCode::HttpUrlSet,
            Request::HttpMethodSet(_) => OpCode::HttpMethodSet,
            Request::HttpHdrAdd(_) => OpCode::HttpHdrAdd,
            Request::HttpHdrDel(_) => OpCode::HttpHdrDel,
            Request::HttpOpen { .. } => OpCode::HttpOpen,
            Request::HttpFinish => OpCode::HttpFinish,
            Request::HttpCertQuery => OpCode::HttpCertQuery,
            Request::HttpCertSet { .. } => OpCode::HttpCertSet,
        }
    }

    /// Encode the complete envelope into `buf`.
    ///
    /// Validates argument lengths first; returns the envelope length on
    /// success. Nothing is written when validation fails.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let body = self.payload_len()?;
        // The envelope length field is 16 bits.
        check_len("payload", body, u16::MAX as usize)?;
        let need = HEADER_LEN + body;
        if buf.len() < need {
            return Err(ProtoError::BufferTooShort {
                len: buf.len(),
                need,
            });
        }

        let mut w = &mut buf[..need];
        w.put_u16(self.opcode().code());
        w.put_u16(body as u16);
        self.put_payload(&mut w);
        debug_assert!(w.is_empty());
        Ok(need)
    }

    fn payload_len(&self) -> Result<usize> {
        Ok(match *self {
            Request::Version
            | Request::ApScan
            | Request::IpCurrent
            | Request::ApLeave
            | Request::SntpCfgGet
            | Request::Datetime
            | Request::FlashId
            | Request::SysStat
            | Request::DefCfgSet
            | Request::FactoryReset
            | Request::Sleep
            | Request::HttpFinish
            | Request::HttpCertQuery => 0,

            Request::Echo(data) | Request::Log(data) => data.len(),

            Request::ApCfgSet { ssid, pass, .. } => {
                check_len("ssid", ssid.len(), SSID_MAXLEN)?;
                check_len("pass", pass.len(), PASS_MAXLEN)?;
                1 + SSID_MAXLEN + PASS_MAXLEN
            }

            Request::ApCfgGet { .. }
            | Request::IpCfgGet { .. }
            | Request::ApJoin { .. }
            | Request::Close { .. }
            | Request::SockStat { .. } => 1,

            Request::IpCfgSet { .. } => IpConfig::WIRE_LEN,

            Request::TcpConnect { dst_addr, .. } => IN_ADDR_FIXED + dst_addr.len() + 1,

            Request::TcpBind { .. } => 7,

            Request::UdpSet { peer, .. } => {
                let addr_len = peer.map_or(0, |(addr, _)| addr.len());
                IN_ADDR_FIXED + addr_len + 1
            }

            Request::SntpCfgSet { servers, .. } => {
                check_len("server list", servers.len(), NTP_SERVER_SLOTS)?;
                let mut len = 4 + 1;
                for server in servers {
                    check_len("server name", server.len(), NTP_POOL_MAXLEN - 1)?;
                    len += server.len() + 1;
                }
                len
            }

            Request::FlashWrite { data, .. } => 4 + data.len(),
            Request::FlashRead { .. } => 6,
            Request::FlashErase { .. } => 2,
            Request::RandomGet { .. } => 2,

            Request::HttpUrlSet(s) | Request::HttpHdrAdd(s) | Request::HttpHdrDel(s) => s.len(),
            Request::HttpMethodSet(_) => 1,
            Request::HttpOpen { .. } => 4,
            Request::HttpCertSet { cert, .. } => 6 + cert.len(),
        })
    }

    fn put_payload(&self, w: &mut impl BufMut) {
        match *self {
            Request::Version
            | Request::ApScan
            | Request::IpCurrent
            | Request::ApLeave
            | Request::SntpCfgGet
            | Request::Datetime
            | Request::FlashId
            | Request::SysStat
            | Request::DefCfgSet
            | Request::FactoryReset
            | Request::Sleep
            | Request::HttpFinish
            | Request::HttpCertQuery => {}

            Request::Echo(data) | Request::Log(data) => w.put_slice(data),

            Request::ApCfgSet { index, ssid, pass } => {
                w.put_u8(index);
                put_padded(w, ssid.as_bytes(), SSID_MAXLEN);
                put_padded(w, pass.as_bytes(), PASS_MAXLEN);
            }

            Request::ApCfgGet { index }
            | Request::IpCfgGet { index }
            | Request::ApJoin { index } => w.put_u8(index),

            Request::Close { ch } | Request::SockStat { ch } => w.put_u8(ch),

            Request::IpCfgSet { index, cfg } => cfg.put(index, w),

            Request::TcpConnect {
                ch,
                dst_addr,
                dst_port,
                src_port,
            } => put_in_addr(w, ch, dst_addr, dst_port, src_port),

            Request::TcpBind { ch, port } => {
                w.put_u32(0);
                w.put_u16(port);
                w.put_u8(ch);
            }

            Request::UdpSet { ch, peer, src_port } => {
                let (addr, port) = peer.unwrap_or(("", 0));
                put_in_addr(w, ch, addr, port, src_port);
            }

            Request::SntpCfgSet {
                up_delay,
                timezone,
                dst,
                servers,
            } => {
                w.put_u16(up_delay);
                w.put_i8(timezone);
                w.put_u8(dst.into());
                for server in servers {
                    w.put_slice(server.as_bytes());
                    w.put_u8(0);
                }
                w.put_u8(0);
            }

            Request::FlashWrite { addr, data } => {
                w.put_u32(addr);
                w.put_slice(data);
            }
            Request::FlashRead { addr, len } => {
                w.put_u32(addr);
                w.put_u16(len);
            }
            Request::FlashErase { sector } => w.put_u16(sector),
            Request::RandomGet { len } => w.put_u16(len),

            Request::HttpUrlSet(s) | Request::HttpHdrAdd(s) | Request::HttpHdrDel(s) => {
                w.put_slice(s.as_bytes())
            }
            Request::HttpMethodSet(method) => w.put_u8(method as u8),
            Request::HttpOpen { content_len } => w.put_u32(content_len),
            Request::HttpCertSet { hash, cert } => {
                w.put_u32(hash);
                w.put_u16(cert.len() as u16);
                w.put_slice(cert);
            }
        }
    }
}

/// Envelope prefix for a certificate too large for the command buffer.
///
/// Writes the header (declaring the full payload length) plus the hash and
/// certificate-length fields; the certificate bytes themselves follow through
/// the framer's split mode. Returns the prefix length.
pub fn cert_set_prefix(hash: u32, cert_len: u16, buf: &mut [u8]) -> Result<usize> {
    let need = HEADER_LEN + 6;
    if buf.len() < need {
        return Err(ProtoError::BufferTooShort {
            len: buf.len(),
            need,
        });
    }
    let mut w = &mut buf[..need];
    w.put_u16(OpCode::HttpCertSet.code());
    w.put_u16(6 + cert_len);
    w.put_u32(hash);
    w.put_u16(cert_len);
    Ok(need)
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(ProtoError::FieldTooLong { field, len, max });
    }
    Ok(())
}

fn put_padded(w: &mut impl BufMut, bytes: &[u8], width: usize) {
    w.put_slice(bytes);
    w.put_bytes(0, width - bytes.len());
}

// dst_port[6] | src_port[6] | channel | dst_addr | NUL. Ports travel as
// NUL-padded ASCII decimal.
fn put_in_addr(w: &mut impl BufMut, ch: u8, dst_addr: &str, dst_port: u16, src_port: u16) {
    put_port(w, dst_port);
    put_port(w, src_port);
    w.put_u8(ch);
    w.put_slice(dst_addr.as_bytes());
    w.put_u8(0);
}

fn put_port(w: &mut impl BufMut, port: u16) {
    let mut field = [0u8; PORT_STR_LEN];
    let text = port.to_string();
    field[..text.len()].copy_from_slice(text.as_bytes());
    w.put_slice(&field);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_encodes_bare_header() {
        let mut buf = [0u8; 8];
        let n = Request::Version.encode(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn echo_carries_payload_and_length() {
        let mut buf = [0u8; 32];
        let n = Request::Echo(b"ping").encode(&mut buf).unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf[..n], &[0x00, 0x02, 0x00, 0x04, b'p', b'i', b'n', b'g']);
    }

    #[test]
    fn ap_cfg_set_pads_fields() {
        let mut buf = [0u8; 128];
        let n = Request::ApCfgSet {
            index: 1,
            ssid: "Home",
            pass: "hunter2",
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(n, 4 + 97);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 97);
        assert_eq!(buf[4], 1);
        assert_eq!(&buf[5..9], b"Home");
        assert_eq!(buf[9], 0);
        assert_eq!(&buf[37..44], b"hunter2");
        assert_eq!(buf[44], 0);
    }

    #[test]
    fn oversized_ssid_rejected() {
        let long = "s".repeat(SSID_MAXLEN + 1);
        let mut buf = [0u8; 128];
        let err = Request::ApCfgSet {
            index: 0,
            ssid: &long,
            pass: "",
        }
        .encode(&mut buf)
        .unwrap_err();
        assert!(matches!(err, ProtoError::FieldTooLong { field: "ssid", .. }));
    }

    #[test]
    fn short_buffer_rejected_before_write() {
        let mut buf = [0xEE; 8];
        let err = Request::Echo(b"0123456789").encode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtoError::BufferTooShort { len: 8, need: 14 }
        ));
        assert_eq!(buf, [0xEE; 8]);
    }

    #[test]
    fn tcp_connect_layout() {
        let mut buf = [0u8; 64];
        let n = Request::TcpConnect {
            ch: 1,
            dst_addr: "example.com",
            dst_port: 443,
            src_port: 0,
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(&buf[4..10], b"443\0\0\0");
        assert_eq!(&buf[10..16], b"0\0\0\0\0\0");
        assert_eq!(buf[16], 1);
        assert_eq!(&buf[17..28], b"example.com");
        assert_eq!(buf[28], 0);
        assert_eq!(n, 29);
    }

    #[test]
    fn udp_reuse_mode_has_empty_peer() {
        let mut buf = [0u8; 32];
        let n = Request::UdpSet {
            ch: 2,
            peer: None,
            src_port: 8007,
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(&buf[4..10], b"0\0\0\0\0\0");
        assert_eq!(&buf[10..16], b"8007\0\0");
        assert_eq!(buf[16], 2);
        // Empty destination address: just its terminator.
        assert_eq!(buf[17], 0);
        assert_eq!(n, 18);
    }

    #[test]
    fn sntp_servers_double_nul_terminated() {
        let mut buf = [0u8; 64];
        let n = Request::SntpCfgSet {
            up_delay: 300,
            timezone: -3,
            dst: true,
            servers: &["a.pool", "b.pool"],
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(u16::from_be_bytes([buf[4], buf[5]]), 300);
        assert_eq!(buf[6] as i8, -3);
        assert_eq!(buf[7], 1);
        assert_eq!(&buf[8..n], b"a.pool\0b.pool\0\0");
    }

    #[test]
    fn too_many_sntp_servers_rejected() {
        let mut buf = [0u8; 64];
        let err = Request::SntpCfgSet {
            up_delay: 15,
            timezone: 0,
            dst: false,
            servers: &["a", "b", "c", "d"],
        }
        .encode(&mut buf)
        .unwrap_err();
        assert!(matches!(
            err,
            ProtoError::FieldTooLong {
                field: "server list",
                ..
            }
        ));
    }

    #[test]
    fn payload_over_length_field_rejected() {
        let data = vec![0u8; u16::MAX as usize + 1];
        let mut buf = vec![0u8; data.len() + HEADER_LEN];
        let err = Request::Echo(&data).encode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtoError::FieldTooLong {
                field: "payload",
                ..
            }
        ));
    }

    #[test]
    fn cert_prefix_declares_full_length() {
        let mut buf = [0u8; 16];
        let n = cert_set_prefix(0xDEAD_BEEF, 2048, &mut buf).unwrap();
        assert_eq!(n, 10);
        assert_eq!(u16::from_be_bytes([buf[0], buf[1]]), OpCode::HttpCertSet.code());
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 6 + 2048);
        assert_eq!(&buf[4..8], &0xDEAD_BEEFu32.to_be_bytes());
        assert_eq!(&buf[8..10], &2048u16.to_be_bytes());
    }
}
