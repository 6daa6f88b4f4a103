//! Multicast UDP Socket (spec §4.6, component C6). Grounded on
//! `original_source/include/jsocketpp/MulticastSocket.hpp`'s
//! `joinGroup`/`leaveGroup`/`setMulticastInterface`/`setTimeToLive`/
//! `setLoopbackMode` surface, built atop [`DatagramSocket`] the way the
//! teacher layers `UnixStream` behavior on raw `sys` calls.

use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};

use crate::error::{SocketError, SocketResult};
use crate::options::validate_ttl;
use crate::sys::RawSocket;
use crate::udp::socket::DatagramSocket;

const DEFAULT_MULTICAST_BUFFER: usize = 2048;

#[cfg(unix)]
mod mlevels {
    pub const IPPROTO_IP: libc::c_int = libc::IPPROTO_IP;
    pub const IPPROTO_IPV6: libc::c_int = libc::IPPROTO_IPV6;
    pub const IP_ADD_MEMBERSHIP: libc::c_int = libc::IP_ADD_MEMBERSHIP;
    pub const IP_DROP_MEMBERSHIP: libc::c_int = libc::IP_DROP_MEMBERSHIP;
    pub const IP_MULTICAST_TTL: libc::c_int = libc::IP_MULTICAST_TTL;
    pub const IP_MULTICAST_LOOP: libc::c_int = libc::IP_MULTICAST_LOOP;
    pub const IP_MULTICAST_IF: libc::c_int = libc::IP_MULTICAST_IF;
    pub const IPV6_JOIN_GROUP: libc::c_int = libc::IPV6_ADD_MEMBERSHIP;
    pub const IPV6_LEAVE_GROUP: libc::c_int = libc::IPV6_DROP_MEMBERSHIP;
    pub const IPV6_MULTICAST_HOPS: libc::c_int = libc::IPV6_MULTICAST_HOPS;
    pub const IPV6_MULTICAST_LOOP: libc::c_int = libc::IPV6_MULTICAST_LOOP;
    pub const IPV6_MULTICAST_IF: libc::c_int = libc::IPV6_MULTICAST_IF;
}

#[cfg(windows)]
mod mlevels {
    // Not present in the pinned `winapi` 0.2.x bundle; values per
    // `ws2ipdef.h`/`ws2tcpip.h`.
    pub const IPPROTO_IP: i32 = 0;
    pub const IPPROTO_IPV6: i32 = 41;
    pub const IP_ADD_MEMBERSHIP: i32 = 12;
    pub const IP_DROP_MEMBERSHIP: i32 = 13;
    pub const IP_MULTICAST_TTL: i32 = 10;
    pub const IP_MULTICAST_LOOP: i32 = 11;
    pub const IP_MULTICAST_IF: i32 = 9;
    pub const IPV6_JOIN_GROUP: i32 = 12;
    pub const IPV6_LEAVE_GROUP: i32 = 13;
    pub const IPV6_MULTICAST_HOPS: i32 = 10;
    pub const IPV6_MULTICAST_LOOP: i32 = 11;
    pub const IPV6_MULTICAST_IF: i32 = 9;
}

use mlevels::*;

#[repr(C)]
struct IpMreq {
    imr_multiaddr: [u8; 4],
    imr_interface: [u8; 4],
}

#[repr(C)]
struct Ipv6Mreq {
    ipv6mr_multiaddr: [u8; 16],
    ipv6mr_interface: u32,
}

/// A UDP socket with multicast group membership (spec §4.6), layering
/// `joinGroup`/`leaveGroup`/TTL/loopback/interface controls on top of a
/// plain [`DatagramSocket`].
#[derive(Debug)]
pub struct MulticastSocket {
    inner: DatagramSocket,
    current_group: Option<String>,
    current_interface: String,
    ttl: u8,
    loopback: bool,
}

impl Deref for MulticastSocket {
    type Target = DatagramSocket;
    fn deref(&self) -> &DatagramSocket {
        &self.inner
    }
}

impl DerefMut for MulticastSocket {
    fn deref_mut(&mut self) -> &mut DatagramSocket {
        &mut self.inner
    }
}

impl MulticastSocket {
    /// Builds and binds a multicast-capable datagram socket (spec §4.6
    /// "Construction"); `port = 0` requests an ephemeral port.
    pub fn new(port: u16) -> SocketResult<MulticastSocket> {
        Self::with_buffer_size(port, DEFAULT_MULTICAST_BUFFER)
    }

    pub fn with_buffer_size(port: u16, buffer_size: usize) -> SocketResult<MulticastSocket> {
        let mut inner = DatagramSocket::new(buffer_size)?;
        inner.bind_port(port)?;
        let socket = MulticastSocket {
            inner,
            current_group: None,
            current_interface: String::new(),
            ttl: 1,
            loopback: true,
        };
        socket.apply_ttl(1)?;
        socket.apply_loopback(true)?;
        Ok(socket)
    }

    fn raw(&self) -> RawSocket {
        self.inner.handle.raw()
    }

    /// Joins `group_addr` (spec §4.6 "Join/leave"), optionally on a
    /// specific local interface.
    pub fn join_group(&mut self, group_addr: &str, iface: &str) -> SocketResult<()> {
        let group: IpAddr = group_addr
            .parse()
            .map_err(|_| SocketError::InvalidArgument(format!("invalid multicast group {group_addr}")))?;
        match group {
            IpAddr::V4(addr) => {
                let interface = parse_v4_interface(iface)?;
                let mreq = IpMreq { imr_multiaddr: addr.octets(), imr_interface: interface.octets() };
                crate::sys::setsockopt_raw(self.raw(), IPPROTO_IP, IP_ADD_MEMBERSHIP, &mreq)?;
            }
            IpAddr::V6(addr) => {
                let index = parse_v6_interface_index(iface)?;
                let mreq = Ipv6Mreq { ipv6mr_multiaddr: addr.octets(), ipv6mr_interface: index };
                crate::sys::setsockopt_raw(self.raw(), IPPROTO_IPV6, IPV6_JOIN_GROUP, &mreq)?;
            }
        }
        self.current_group = Some(group_addr.to_string());
        self.current_interface = iface.to_string();
        Ok(())
    }

    /// Leaves `group_addr` (spec §4.6 "Join/leave"); `iface` must match
    /// whatever was passed to the corresponding [`MulticastSocket::join_group`].
    pub fn leave_group(&mut self, group_addr: &str, iface: &str) -> SocketResult<()> {
        let group: IpAddr = group_addr
            .parse()
            .map_err(|_| SocketError::InvalidArgument(format!("invalid multicast group {group_addr}")))?;
        match group {
            IpAddr::V4(addr) => {
                let interface = parse_v4_interface(iface)?;
                let mreq = IpMreq { imr_multiaddr: addr.octets(), imr_interface: interface.octets() };
                crate::sys::setsockopt_raw(self.raw(), IPPROTO_IP, IP_DROP_MEMBERSHIP, &mreq)?;
            }
            IpAddr::V6(addr) => {
                let index = parse_v6_interface_index(iface)?;
                let mreq = Ipv6Mreq { ipv6mr_multiaddr: addr.octets(), ipv6mr_interface: index };
                crate::sys::setsockopt_raw(self.raw(), IPPROTO_IPV6, IPV6_LEAVE_GROUP, &mreq)?;
            }
        }
        if self.current_group.as_deref() == Some(group_addr) {
            self.current_group = None;
        }
        Ok(())
    }

    /// Sets the default outgoing interface for multicast packets (spec
    /// §4.6 "Outgoing interface"): an IPv4 address for v4 sockets, a name
    /// or numeric index for v6.
    pub fn set_multicast_interface(&mut self, iface: &str) -> SocketResult<()> {
        if iface.is_empty() {
            let zero = Ipv4Addr::UNSPECIFIED.octets();
            crate::sys::setsockopt_raw(self.raw(), IPPROTO_IP, IP_MULTICAST_IF, &zero)?;
            self.current_interface.clear();
            return Ok(());
        }
        if let Ok(addr) = iface.parse::<Ipv4Addr>() {
            let octets = addr.octets();
            crate::sys::setsockopt_raw(self.raw(), IPPROTO_IP, IP_MULTICAST_IF, &octets)?;
        } else {
            let index = parse_v6_interface_index(iface)?;
            crate::sys::setsockopt_raw(self.raw(), IPPROTO_IPV6, IPV6_MULTICAST_IF, &index)?;
        }
        self.current_interface = iface.to_string();
        Ok(())
    }

    pub fn multicast_interface(&self) -> &str {
        &self.current_interface
    }

    /// Sets both `IP_MULTICAST_TTL` and `IPV6_MULTICAST_HOPS` so the
    /// setting applies regardless of which family the socket later sends
    /// on (spec §4.6 "TTL").
    pub fn set_time_to_live(&mut self, ttl: u32) -> SocketResult<()> {
        let ttl = validate_ttl(ttl)?;
        self.apply_ttl(ttl)?;
        self.ttl = ttl;
        Ok(())
    }

    fn apply_ttl(&self, ttl: u8) -> SocketResult<()> {
        crate::sys::setsockopt_int(self.raw(), IPPROTO_IP, IP_MULTICAST_TTL, ttl as i32)?;
        // Best-effort: a v4-only socket may reject the v6 option.
        let _ = crate::sys::setsockopt_int(self.raw(), IPPROTO_IPV6, IPV6_MULTICAST_HOPS, ttl as i32);
        Ok(())
    }

    pub fn time_to_live(&self) -> u8 {
        self.ttl
    }

    /// Enables or disables receiving this socket's own multicast sends
    /// (spec §4.6 "Loopback").
    pub fn set_loopback_mode(&mut self, enable: bool) -> SocketResult<()> {
        self.apply_loopback(enable)?;
        self.loopback = enable;
        Ok(())
    }

    fn apply_loopback(&self, enable: bool) -> SocketResult<()> {
        crate::sys::setsockopt_int(self.raw(), IPPROTO_IP, IP_MULTICAST_LOOP, enable as i32)?;
        let _ = crate::sys::setsockopt_int(self.raw(), IPPROTO_IPV6, IPV6_MULTICAST_LOOP, enable as i32);
        Ok(())
    }

    pub fn loopback_mode(&self) -> bool {
        self.loopback
    }

    /// The last group successfully joined, for diagnostics (spec §4.6
    /// "getCurrentGroup").
    pub fn current_group(&self) -> Option<&str> {
        self.current_group.as_deref()
    }
}

fn parse_v4_interface(iface: &str) -> SocketResult<Ipv4Addr> {
    if iface.is_empty() {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }
    iface
        .parse()
        .map_err(|_| SocketError::InvalidArgument(format!("invalid IPv4 interface address {iface}")))
}

fn parse_v6_interface_index(iface: &str) -> SocketResult<u32> {
    if iface.is_empty() {
        return Ok(0);
    }
    if let Ok(index) = iface.parse::<u32>() {
        return Ok(index);
    }
    #[cfg(unix)]
    {
        let c_name = std::ffi::CString::new(iface)
            .map_err(|_| SocketError::InvalidArgument(format!("invalid interface name {iface}")))?;
        let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if index == 0 {
            return Err(SocketError::from_last_os_error());
        }
        Ok(index)
    }
    #[cfg(windows)]
    {
        Err(SocketError::InvalidArgument(format!(
            "interface name lookup unsupported on this platform: {iface}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_conservative_source_values() {
        let sock = MulticastSocket::new(0).unwrap();
        assert_eq!(sock.time_to_live(), 1);
        assert!(sock.loopback_mode());
        assert_eq!(sock.current_group(), None);
    }

    #[test]
    fn invalid_group_address_is_rejected() {
        let mut sock = MulticastSocket::new(0).unwrap();
        let err = sock.join_group("not-an-address", "").unwrap_err();
        assert!(matches!(err, SocketError::InvalidArgument(_)));
    }

    #[test]
    fn join_v4_group_records_current_group() {
        let mut sock = MulticastSocket::new(0).unwrap();
        sock.join_group("239.255.0.1", "").unwrap();
        assert_eq!(sock.current_group(), Some("239.255.0.1"));
        sock.leave_group("239.255.0.1", "").unwrap();
        assert_eq!(sock.current_group(), None);
    }

    #[test]
    fn ttl_out_of_range_is_rejected() {
        let mut sock = MulticastSocket::new(0).unwrap();
        assert!(sock.set_time_to_live(256).is_err());
    }
}
