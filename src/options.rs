//! Typed socket-option facade (spec §4.2, component C2).
//!
//! Grounded on the teacher's one-method-per-option forwarding style
//! (`examples/damonbarry-mio/src/stream.rs`'s `set_nodelay`/`nodelay`,
//! `set_recv_buffer_size`/`recv_buffer_size`, `set_keepalive`/`keepalive`,
//! `set_only_v6`/`only_v6`), generalized from `net2::TcpBuilder`/
//! `std::net::TcpStream` forwarding onto this crate's own `sys::{set,get}sockopt_*`
//! primitives so the same facade serves TCP, UDP, and UDS alike.

use std::time::Duration;

use crate::error::{SocketError, SocketResult};
use crate::sys::{self, RawSocket};

#[cfg(unix)]
mod levels {
    pub const SOL_SOCKET: libc::c_int = libc::SOL_SOCKET;
    pub const IPPROTO_TCP: libc::c_int = libc::IPPROTO_TCP;
    pub const IPPROTO_IPV6: libc::c_int = libc::IPPROTO_IPV6;
    pub const SO_REUSEADDR: libc::c_int = libc::SO_REUSEADDR;
    pub const SO_KEEPALIVE: libc::c_int = libc::SO_KEEPALIVE;
    pub const SO_RCVBUF: libc::c_int = libc::SO_RCVBUF;
    pub const SO_SNDBUF: libc::c_int = libc::SO_SNDBUF;
    pub const SO_RCVTIMEO: libc::c_int = libc::SO_RCVTIMEO;
    pub const SO_SNDTIMEO: libc::c_int = libc::SO_SNDTIMEO;
    pub const TCP_NODELAY: libc::c_int = libc::TCP_NODELAY;
    pub const IPV6_V6ONLY: libc::c_int = libc::IPV6_V6ONLY;
}

#[cfg(windows)]
mod levels {
    // Winsock's option levels/names are stable ABI constants not all
    // present in the `winapi` 0.2.x bundle this crate pins, so they're
    // written out directly (values per `winsock2.h`/`ws2ipdef.h`).
    pub const SOL_SOCKET: i32 = 0xffff;
    pub const IPPROTO_TCP: i32 = 6;
    pub const IPPROTO_IPV6: i32 = 41;
    pub const SO_REUSEADDR: i32 = 0x0004;
    // Windows' passive-socket exclusive-use option (spec §4.2).
    pub const SO_EXCLUSIVEADDRUSE: i32 = -5i32;
    pub const SO_KEEPALIVE: i32 = 0x0008;
    pub const SO_RCVBUF: i32 = 0x1002;
    pub const SO_SNDBUF: i32 = 0x1001;
    pub const SO_RCVTIMEO: i32 = 0x1006;
    pub const SO_SNDTIMEO: i32 = 0x1005;
    pub const TCP_NODELAY: i32 = 0x0001;
    pub const IPV6_V6ONLY: i32 = 27;
}

use levels::*;

/// A thin, typed wrapper around one raw descriptor's option surface.
/// `passive` selects `SO_EXCLUSIVEADDRUSE` vs. `SO_REUSEADDR` on Windows
/// for address reuse (spec §4.2, §9 "Polymorphism of passive-ness") --
/// listener sockets pass `true`, every other socket kind passes `false`.
#[derive(Debug)]
pub struct SocketOptions {
    sock: RawSocket,
    passive: bool,
}

impl SocketOptions {
    pub fn new(sock: RawSocket, passive: bool) -> SocketOptions {
        SocketOptions { sock, passive }
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    /// Sets address reuse. On Windows, a passive socket uses
    /// `SO_EXCLUSIVEADDRUSE` (inverted sense: "exclusive" = `!reuse`);
    /// every other case uses `SO_REUSEADDR` directly.
    pub fn set_reuse_address(&self, reuse: bool) -> SocketResult<()> {
        #[cfg(windows)]
        {
            if self.passive {
                return sys::setsockopt_int(self.sock, SOL_SOCKET, SO_EXCLUSIVEADDRUSE, !reuse as i32);
            }
        }
        sys::setsockopt_int(self.sock, SOL_SOCKET, SO_REUSEADDR, reuse as i32).map(|_| ())
    }

    /// Reads address reuse back, un-inverting the Windows exclusive-use
    /// sense so callers always observe "reuse" semantics (spec §4.2).
    pub fn reuse_address(&self) -> SocketResult<bool> {
        #[cfg(windows)]
        {
            if self.passive {
                let exclusive = sys::getsockopt_int(self.sock, SOL_SOCKET, SO_EXCLUSIVEADDRUSE)?;
                return Ok(exclusive == 0);
            }
        }
        let v = sys::getsockopt_int(self.sock, SOL_SOCKET, SO_REUSEADDR)?;
        Ok(v != 0)
    }

    pub fn set_recv_timeout(&self, dur: Option<Duration>) -> SocketResult<()> {
        sys::setsockopt_timeval(self.sock, SOL_SOCKET, SO_RCVTIMEO, dur)
    }

    pub fn recv_timeout(&self) -> SocketResult<Option<Duration>> {
        sys::getsockopt_timeval(self.sock, SOL_SOCKET, SO_RCVTIMEO)
    }

    pub fn set_send_timeout(&self, dur: Option<Duration>) -> SocketResult<()> {
        sys::setsockopt_timeval(self.sock, SOL_SOCKET, SO_SNDTIMEO, dur)
    }

    pub fn send_timeout(&self) -> SocketResult<Option<Duration>> {
        sys::getsockopt_timeval(self.sock, SOL_SOCKET, SO_SNDTIMEO)
    }

    /// Sets `SO_RCVBUF`. The OS may halve, double, round, or cap the
    /// request; [`SocketOptions::recv_buffer_size`] reports back whatever
    /// the OS now reports, with no reconciliation attempted (spec §4.2).
    pub fn set_recv_buffer_size(&self, size: usize) -> SocketResult<()> {
        sys::setsockopt_int(self.sock, SOL_SOCKET, SO_RCVBUF, size as i32)
    }

    pub fn recv_buffer_size(&self) -> SocketResult<usize> {
        Ok(sys::getsockopt_int(self.sock, SOL_SOCKET, SO_RCVBUF)? as usize)
    }

    pub fn set_send_buffer_size(&self, size: usize) -> SocketResult<()> {
        sys::setsockopt_int(self.sock, SOL_SOCKET, SO_SNDBUF, size as i32)
    }

    pub fn send_buffer_size(&self) -> SocketResult<usize> {
        Ok(sys::getsockopt_int(self.sock, SOL_SOCKET, SO_SNDBUF)? as usize)
    }

    pub fn set_nodelay(&self, nodelay: bool) -> SocketResult<()> {
        sys::setsockopt_int(self.sock, IPPROTO_TCP, TCP_NODELAY, nodelay as i32)
    }

    pub fn nodelay(&self) -> SocketResult<bool> {
        Ok(sys::getsockopt_int(self.sock, IPPROTO_TCP, TCP_NODELAY)? != 0)
    }

    pub fn set_keepalive(&self, enabled: bool) -> SocketResult<()> {
        sys::setsockopt_int(self.sock, SOL_SOCKET, SO_KEEPALIVE, enabled as i32)
    }

    pub fn keepalive(&self) -> SocketResult<bool> {
        Ok(sys::getsockopt_int(self.sock, SOL_SOCKET, SO_KEEPALIVE)? != 0)
    }

    /// Sets `IPV6_V6ONLY`; `false` (the default per spec §4.3) enables
    /// dual-stack IPv4-mapped-IPv6 acceptance.
    pub fn set_only_v6(&self, only_v6: bool) -> SocketResult<()> {
        sys::setsockopt_int(self.sock, IPPROTO_IPV6, IPV6_V6ONLY, only_v6 as i32)
    }

    pub fn only_v6(&self) -> SocketResult<bool> {
        Ok(sys::getsockopt_int(self.sock, IPPROTO_IPV6, IPV6_V6ONLY)? != 0)
    }
}

/// TTL bounds shared by unicast and multicast TTL/hop-limit setters (spec
/// §4.6, §8 "TTL outside 0..=255 raises InvalidArgument").
pub fn validate_ttl(ttl: u32) -> SocketResult<u8> {
    u8::try_from(ttl).map_err(|_| SocketError::InvalidArgument(format!("TTL {ttl} is out of range 0..=255")))
}

/// Bundles the tuning applied to every accepted/connected stream socket
/// (spec §4.3 "SocketTuning").
#[derive(Debug, Clone)]
pub struct SocketTuning {
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
    pub internal_buffer_size: usize,
    pub recv_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub nodelay: bool,
    pub keepalive: bool,
    pub nonblocking: bool,
}

impl Default for SocketTuning {
    fn default() -> SocketTuning {
        SocketTuning {
            recv_buffer_size: None,
            send_buffer_size: None,
            internal_buffer_size: crate::buf::DEFAULT_INTERNAL_BUFFER_SIZE,
            recv_timeout: None,
            send_timeout: None,
            nodelay: true,
            keepalive: false,
            nonblocking: false,
        }
    }
}

impl SocketTuning {
    /// Applies every setting to `sock`'s option facade, in the order a
    /// freshly accepted/connected socket should receive them.
    pub fn apply(&self, options: &SocketOptions) -> SocketResult<()> {
        if let Some(size) = self.recv_buffer_size {
            options.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer_size {
            options.set_send_buffer_size(size)?;
        }
        options.set_recv_timeout(self.recv_timeout)?;
        options.set_send_timeout(self.send_timeout)?;
        options.set_nodelay(self.nodelay)?;
        options.set_keepalive(self.keepalive)?;
        Ok(())
    }

    /// Same as [`SocketTuning::apply`] but skips `TCP_NODELAY`/`SO_KEEPALIVE`,
    /// which `AF_UNIX` sockets don't support (spec §4.7 "mirrors the TCP
    /// stream" -- buffer sizes and timeouts still apply, the TCP-specific
    /// options don't).
    pub fn apply_unix(&self, options: &SocketOptions) -> SocketResult<()> {
        if let Some(size) = self.recv_buffer_size {
            options.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer_size {
            options.set_send_buffer_size(size)?;
        }
        options.set_recv_timeout(self.recv_timeout)?;
        options.set_send_timeout(self.send_timeout)?;
        Ok(())
    }
}
