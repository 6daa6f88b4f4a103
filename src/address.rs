//! The address data model (spec §3 "Port", "Address"; spec §6 "External
//! Interfaces"). Grounded on the teacher's direct reliance on
//! `std::net::SocketAddr` (`examples/damonbarry-mio/src/stream.rs`), widened
//! here to also carry `AF_UNIX` filesystem paths.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::path::{Path, PathBuf};

/// A 16-bit network port, always held in host byte order at the API
/// surface; conversion to network byte order happens only at the
/// syscall boundary (spec §3).
pub type Port = u16;

/// A socket endpoint: an IPv4 or IPv6 socket address, or a filesystem
/// path for `AF_UNIX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    V4 { ip: Ipv4Addr, port: Port },
    V6 { ip: Ipv6Addr, port: Port, scope_id: u32, flow_info: u32 },
    Unix(PathBuf),
}

impl Address {
    pub fn wildcard_v4(port: Port) -> Address {
        Address::V4 { ip: Ipv4Addr::UNSPECIFIED, port }
    }

    pub fn wildcard_v6(port: Port) -> Address {
        Address::V6 { ip: Ipv6Addr::UNSPECIFIED, port, scope_id: 0, flow_info: 0 }
    }

    pub fn unix(path: impl AsRef<Path>) -> Address {
        Address::Unix(path.as_ref().to_path_buf())
    }

    pub fn port(&self) -> Option<Port> {
        match self {
            Address::V4 { port, .. } => Some(*port),
            Address::V6 { port, .. } => Some(*port),
            Address::Unix(_) => None,
        }
    }

    /// True for an IPv6 address of the form `::ffff:a.b.c.d` (spec §3,
    /// §6, GLOSSARY "IPv4-mapped IPv6").
    pub fn is_ipv4_mapped(&self) -> bool {
        matches!(self, Address::V6 { ip, .. } if ip.to_ipv4_mapped().is_some())
    }

    /// Projects an IPv4-mapped IPv6 address down to plain IPv4. Returns
    /// `self` unchanged for every other variant.
    pub fn normalized(self) -> Address {
        match self {
            Address::V6 { ip, port, .. } => match ip.to_ipv4_mapped() {
                Some(v4) => Address::V4 { ip: v4, port },
                None => Address::V6 { ip, port, scope_id: 0, flow_info: 0 },
            },
            other => other,
        }
    }

    /// Renders `IP:port` for IPv4, `[IP]:port` for IPv6, and the bare path
    /// for `AF_UNIX`. `normalize_mapped` controls whether an IPv4-mapped
    /// IPv6 address is projected to plain IPv4 before rendering (spec §6,
    /// default `true` at the call sites that expose this knob).
    pub fn render(&self, normalize_mapped: bool) -> String {
        match self {
            Address::V4 { ip, port } => format!("{ip}:{port}"),
            Address::V6 { ip, port, scope_id, .. } => {
                if normalize_mapped {
                    if let Some(v4) = ip.to_ipv4_mapped() {
                        return format!("{v4}:{port}");
                    }
                }
                if *scope_id != 0 {
                    format!("[{ip}%{scope_id}]:{port}")
                } else {
                    format!("[{ip}]:{port}")
                }
            }
            Address::Unix(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Address {
        match addr {
            SocketAddr::V4(a) => Address::V4 { ip: *a.ip(), port: a.port() },
            SocketAddr::V6(a) => Address::V6 {
                ip: *a.ip(),
                port: a.port(),
                scope_id: a.scope_id(),
                flow_info: a.flowinfo(),
            },
        }
    }
}

impl TryFrom<Address> for SocketAddr {
    type Error = crate::error::SocketError;

    fn try_from(addr: Address) -> Result<SocketAddr, Self::Error> {
        match addr {
            Address::V4 { ip, port } => Ok(SocketAddr::V4(SocketAddrV4::new(ip, port))),
            Address::V6 { ip, port, scope_id, flow_info } => {
                Ok(SocketAddr::V6(SocketAddrV6::new(ip, port, flow_info, scope_id)))
            }
            Address::Unix(_) => Err(crate::error::SocketError::Unsupported(
                "AF_UNIX address has no SocketAddr representation".into(),
            )),
        }
    }
}
