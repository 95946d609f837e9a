use crate::error::ProtoError;

/// Command table shared by both sides of the control channel.
///
/// Requests carry the command's opcode; replies carry [`OpCode::Ok`] or
/// [`OpCode::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    /// Positive reply.
    Ok = 0,
    /// Firmware version query.
    Version = 1,
    /// Echo payload back.
    Echo = 2,
    /// Scan for access points.
    ApScan = 3,
    /// Store an access-point configuration slot.
    ApCfg = 4,
    /// Read an access-point configuration slot.
    ApCfgGet = 5,
    /// Read the currently leased IPv4 configuration.
    IpCurrent = 6,
    /// Store an IPv4 configuration slot.
    IpCfg = 7,
    /// Read an IPv4 configuration slot.
    IpCfgGet = 8,
    /// Join the access point of a configuration slot.
    ApJoin = 9,
    /// Leave the joined access point.
    ApLeave = 10,
    /// Open a TCP client connection.
    TcpCon = 11,
    /// Bind and listen on a TCP port.
    TcpBind = 12,
    /// Close the socket of a channel.
    Close = 13,
    /// Configure a UDP socket.
    UdpSet = 14,
    /// Query socket state of a channel.
    SockStat = 15,
    /// Configure the time-sync service.
    SntpCfg = 16,
    /// Read the time-sync configuration.
    SntpCfgGet = 17,
    /// Read date and time.
    Datetime = 18,
    /// Write module flash.
    FlashWrite = 19,
    /// Read module flash.
    FlashRead = 20,
    /// Erase a module flash sector.
    FlashErase = 21,
    /// Read the flash chip identifier.
    FlashId = 22,
    /// Query system status.
    SysStat = 23,
    /// Restore default configuration.
    DefCfgSet = 24,
    /// Fetch hardware random bytes.
    RandomGet = 25,
    /// Write a line to the module debug console.
    Log = 26,
    /// Full factory reset.
    FactoryReset = 27,
    /// Enter low-power sleep.
    Sleep = 28,
    /// Set the HTTP session URL.
    HttpUrlSet = 29,
    /// Set the HTTP session method.
    HttpMethodSet = 30,
    /// Add an HTTP request header.
    HttpHdrAdd = 31,
    /// Delete an HTTP request header.
    HttpHdrDel = 32,
    /// Start the HTTP exchange.
    HttpOpen = 33,
    /// Finish the HTTP exchange and fetch status/length.
    HttpFinish = 34,
    /// Query the hash of the installed certificate.
    HttpCertQuery = 35,
    /// Install a certificate for the HTTP session.
    HttpCertSet = 36,
    /// Negative reply.
    Error = 255,
}

impl OpCode {
    /// Wire value of the opcode.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for OpCode {
    type Error = ProtoError;

    fn try_from(value: u16) -> Result<Self, ProtoError> {
        use OpCode::*;
        core::result::Result::Ok(match value {
            0 => Ok,
            1 => Version,
            2 => Echo,
            3 => ApScan,
            4 => ApCfg,
            5 => ApCfgGet,
            6 => IpCurrent,
            7 => IpCfg,
            8 => IpCfgGet,
            9 => ApJoin,
            10 => ApLeave,
            11 => TcpCon,
            12 => TcpBind,
            13 => Close,
            14 => UdpSet,
            15 => SockStat,
            16 => SntpCfg,
            17 => SntpCfgGet,
            18 => Datetime,
            19 => FlashWrite,
            20 => FlashRead,
            21 => FlashErase,
            22 => FlashId,
            23 => SysStat,
            24 => DefCfgSet,
            25 => RandomGet,
            26 => Log,
            27 => FactoryReset,
            28 => Sleep,
            29 => HttpUrlSet,
            30 => HttpMethodSet,
            31 => HttpHdrAdd,
            32 => HttpHdrDel,
            33 => HttpOpen,
            34 => HttpFinish,
            35 => HttpCertQuery,
            36 => HttpCertSet,
            255 => Error,
            other => return Err(ProtoError::UnknownOpcode(other)),
        })
    }
}
