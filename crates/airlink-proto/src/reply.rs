//! Typed parsers for reply payloads.
//!
//! A reply envelope carries [`OpCode::Ok`] or [`OpCode::Error`]; the payload
//! shape depends on the request that was issued, so the caller picks the
//! matching parser here.

use crate::error::{ProtoError, Result};
use crate::opcode::OpCode;
use crate::types::{trimmed_str, ApConfig, DateTime, SntpConfig, SockState, SysStatus};
use crate::{HEADER_LEN, PASS_MAXLEN, SSID_MAXLEN};

/// Split a received envelope into its opcode and payload.
///
/// Rejects frames shorter than the header and frames whose length field does
/// not match the bytes actually received.
pub fn header(frame: &[u8]) -> Result<(OpCode, &[u8])> {
    if frame.len() < HEADER_LEN {
        return Err(ProtoError::Truncated {
            len: frame.len(),
            need: HEADER_LEN,
        });
    }
    let op = OpCode::try_from(u16::from_be_bytes([frame[0], frame[1]]))?;
    let declared = usize::from(u16::from_be_bytes([frame[2], frame[3]]));
    let payload = &frame[HEADER_LEN..];
    if payload.len() != declared {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: declared,
        });
    }
    Ok((op, payload))
}

/// Firmware version reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub micro: u8,
    /// Build variant name.
    pub variant: String,
}

/// Parse a version reply: three version bytes plus the variant name.
pub fn version(payload: &[u8]) -> Result<Version> {
    if payload.len() < 3 {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: 3,
        });
    }
    Ok(Version {
        major: payload[0],
        minor: payload[1],
        micro: payload[2],
        variant: trimmed_str(&payload[3..], "variant")?,
    })
}

/// Parse an access-point configuration read: slot index plus the stored
/// credentials in their fixed NUL-padded fields.
pub fn ap_config(payload: &[u8]) -> Result<(u8, ApConfig)> {
    let need = 1 + SSID_MAXLEN + PASS_MAXLEN;
    if payload.len() < need {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need,
        });
    }
    let ssid = trimmed_str(&payload[1..1 + SSID_MAXLEN], "ssid")?;
    let pass = trimmed_str(&payload[1 + SSID_MAXLEN..need], "pass")?;
    Ok((payload[0], ApConfig { ssid, pass }))
}

/// Parse a socket status reply.
pub fn sock_status(payload: &[u8]) -> Result<SockState> {
    if payload.is_empty() {
        return Err(ProtoError::Truncated { len: 0, need: 1 });
    }
    SockState::try_from(payload[0])
}

/// Parse a system status reply.
pub fn sys_status(payload: &[u8]) -> Result<SysStatus> {
    if payload.len() < SysStatus::WIRE_LEN {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: SysStatus::WIRE_LEN,
        });
    }
    SysStatus::from_bytes([payload[0], payload[1], payload[2], payload[3]])
}

/// Parse a date-and-time reply: big-endian binary stamp plus the module's
/// textual rendering.
pub fn datetime(payload: &[u8]) -> Result<DateTime> {
    if payload.len() < 8 {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: 8,
        });
    }
    let mut stamp = [0u8; 8];
    stamp.copy_from_slice(&payload[..8]);
    Ok(DateTime {
        stamp: u64::from_be_bytes(stamp),
        text: trimmed_str(&payload[8..], "datetime")?,
    })
}

/// Parse a flash chip identifier reply: manufacturer byte plus device word.
pub fn flash_id(payload: &[u8]) -> Result<(u8, u16)> {
    if payload.len() < 3 {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: 3,
        });
    }
    Ok((payload[0], u16::from_be_bytes([payload[1], payload[2]])))
}

/// Parse an HTTP finish reply: response status plus body length.
pub fn http_finish(payload: &[u8]) -> Result<(u16, u32)> {
    if payload.len() < 6 {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: 6,
        });
    }
    let status = u16::from_be_bytes([payload[0], payload[1]]);
    let body_len = u32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]);
    Ok((status, body_len))
}

/// Parse a certificate hash query reply.
pub fn cert_hash(payload: &[u8]) -> Result<u32> {
    if payload.len() < 4 {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: 4,
        });
    }
    Ok(u32::from_be_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}

/// Parse a time-sync configuration read: fixed fields plus the NUL-separated,
/// double-NUL-terminated server list.
pub fn sntp_config(payload: &[u8]) -> Result<SntpConfig> {
    if payload.len() < 5 {
        return Err(ProtoError::Truncated {
            len: payload.len(),
            need: 5,
        });
    }
    let mut servers = Vec::new();
    let mut rest = &payload[4..];
    while let Some(end) = rest.iter().position(|&b| b == 0) {
        if end == 0 {
            break;
        }
        servers.push(trimmed_str(&rest[..end], "server name")?);
        rest = &rest[end + 1..];
    }
    Ok(SntpConfig {
        up_delay: u16::from_be_bytes([payload[0], payload[1]]),
        timezone: payload[2] as i8,
        dst: payload[3] != 0,
        servers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SysState;

    #[test]
    fn header_splits_ok_envelope() {
        let frame = [0x00, 0x00, 0x00, 0x02, 0xAB, 0xCD];
        let (op, payload) = header(&frame).unwrap();
        assert_eq!(op, OpCode::Ok);
        assert_eq!(payload, &[0xAB, 0xCD]);
    }

    #[test]
    fn header_rejects_length_mismatch() {
        let frame = [0x00, 0x00, 0x00, 0x05, 0xAB];
        let err = header(&frame).unwrap_err();
        assert!(matches!(err, ProtoError::Truncated { len: 1, need: 5 }));
    }

    #[test]
    fn header_rejects_unknown_opcode() {
        let frame = [0x00, 0x63, 0x00, 0x00];
        assert_eq!(header(&frame).unwrap_err(), ProtoError::UnknownOpcode(99));
    }

    #[test]
    fn version_parses_variant() {
        let payload = b"\x01\x05\x02std";
        let v = version(payload).unwrap();
        assert_eq!((v.major, v.minor, v.micro), (1, 5, 2));
        assert_eq!(v.variant, "std");
    }

    #[test]
    fn ap_config_trims_padding() {
        let mut payload = vec![1u8];
        payload.extend_from_slice(b"Home");
        payload.resize(1 + SSID_MAXLEN, 0);
        payload.extend_from_slice(b"hunter2");
        payload.resize(1 + SSID_MAXLEN + PASS_MAXLEN, 0);

        let (slot, cfg) = ap_config(&payload).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(cfg.ssid, "Home");
        assert_eq!(cfg.pass, "hunter2");
    }

    #[test]
    fn sys_status_parses_ready_word() {
        let st = sys_status(&[4, 0x03, 0x00, 0x04]).unwrap();
        assert_eq!(st.state, SysState::Ready);
        assert!(st.online);
        assert!(st.cfg_ok);
        assert!(!st.dt_ok);
        assert_eq!(st.ch_ev, 0b100);
    }

    #[test]
    fn datetime_splits_stamp_and_text() {
        let mut payload = 1_700_000_000u64.to_be_bytes().to_vec();
        payload.extend_from_slice(b"Tue Nov 14 22:13:20 2023\0");
        let dt = datetime(&payload).unwrap();
        assert_eq!(dt.stamp, 1_700_000_000);
        assert_eq!(dt.text, "Tue Nov 14 22:13:20 2023");
    }

    #[test]
    fn http_finish_splits_status_and_length() {
        let payload = [0x00, 0xC8, 0x00, 0x00, 0x12, 0x34];
        assert_eq!(http_finish(&payload).unwrap(), (200, 0x1234));
    }

    #[test]
    fn sntp_config_collects_servers() {
        let mut payload = vec![0x01, 0x2C, 0xFD, 0x01];
        payload.extend_from_slice(b"a.pool\0b.pool\0\0");
        let cfg = sntp_config(&payload).unwrap();
        assert_eq!(cfg.up_delay, 300);
        assert_eq!(cfg.timezone, -3);
        assert!(cfg.dst);
        assert_eq!(cfg.servers, ["a.pool", "b.pool"]);
    }

    #[test]
    fn sntp_config_handles_empty_list() {
        let cfg = sntp_config(&[0, 15, 0, 0, 0]).unwrap();
        assert_eq!(cfg.up_delay, 15);
        assert!(cfg.servers.is_empty());
    }

    #[test]
    fn flash_id_splits_fields() {
        assert_eq!(flash_id(&[0xEF, 0x40, 0x16]).unwrap(), (0xEF, 0x4016));
    }
}
