//! # Base Types
//!
//! Scalar types shared by every replica admin structure. Each one travels on the
//! wire as a single primitive value rather than as a struct.
use crate::protocol::{ProtocolReader, ProtocolResult, ProtocolWriter};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// Bit 0 of every address built locally. Marks the value as initialized.
const ADDRESS_TAG: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("'{0}' is not an IPv4 address")]
    NotIpv4(IpAddr),
    #[error("Invalid address '{0}': expected 'a.b.c.d:port'")]
    Unparseable(String),
}

/// An IPv4 endpoint packed into one 64-bit integer.
///
/// ```text
/// bits 63..32  IPv4 address, big-endian
/// bits 31..16  port
/// bit  0       tag, always 1 for locally built addresses
/// ```
///
/// Values decoded from the wire are kept verbatim, including any flag bits a peer
/// might set, so re-encoding an address never changes it. `PartialEq` compares the
/// packed integer; [`RpcAddress::equals`] compares endpoints only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RpcAddress {
    address: i64,
}

impl RpcAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        let ip = u64::from(ip.to_bits());
        let packed = (ip << 32) | (u64::from(port) << 16);
        Self {
            address: packed as i64 | ADDRESS_TAG,
        }
    }

    /// Builds an address from any IP, accepting IPv6 only in its IPv4-mapped form.
    pub fn from_ip(ip: IpAddr, port: u16) -> Result<Self, AddressError> {
        match ip {
            IpAddr::V4(v4) => Ok(Self::new(v4, port)),
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(|v4| Self::new(v4, port))
                .ok_or(AddressError::NotIpv4(ip)),
        }
    }

    pub fn from_raw(address: i64) -> Self {
        Self { address }
    }

    /// The packed integer exactly as it travels on the wire.
    pub fn raw(&self) -> i64 {
        self.address
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits((self.address >> 32) as u32)
    }

    pub fn port(&self) -> u16 {
        ((self.address >> 16) & 0xffff) as u16
    }

    /// True when both addresses render to the same `ip:port`.
    pub fn equals(&self, other: &RpcAddress) -> bool {
        self.ip() == other.ip() && self.port() == other.port()
    }

    pub fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        Ok(Self::from_raw(reader.read_i64()?))
    }

    pub fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_i64(self.address)
    }
}

impl fmt::Display for RpcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port())
    }
}

impl FromStr for RpcAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: SocketAddrV4 = s
            .parse()
            .map_err(|_| AddressError::Unparseable(s.to_string()))?;
        Ok(Self::new(*addr.ip(), addr.port()))
    }
}

impl Serialize for RpcAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A partition id: application id in the low word, partition index in the high word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Gpid {
    pub app_id: i32,
    pub partition_index: i32,
}

impl Gpid {
    pub fn new(app_id: i32, partition_index: i32) -> Self {
        Self {
            app_id,
            partition_index,
        }
    }

    pub fn raw(&self) -> i64 {
        i64::from(self.app_id as u32) | (i64::from(self.partition_index) << 32)
    }

    pub fn from_raw(raw: i64) -> Self {
        Self {
            app_id: raw as i32,
            partition_index: (raw >> 32) as i32,
        }
    }

    pub fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        Ok(Self::from_raw(reader.read_i64()?))
    }

    pub fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_i64(self.raw())
    }
}

impl fmt::Display for Gpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_id, self.partition_index)
    }
}

impl Serialize for Gpid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A service error code such as `ERR_OK`, carried as its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub String);

impl ErrorCode {
    pub const OK: &str = "ERR_OK";

    pub fn ok() -> Self {
        Self(Self::OK.to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.0 == Self::OK
    }

    pub fn read(reader: &mut dyn ProtocolReader) -> ProtocolResult<Self> {
        Ok(Self(reader.read_string()?))
    }

    pub fn write(&self, writer: &mut dyn ProtocolWriter) -> ProtocolResult<()> {
        writer.write_string(&self.0)
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
