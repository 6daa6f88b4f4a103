//! Winsock syscall surface, built on the same `winapi`/`ws2_32-sys`/`miow`
//! trio the teacher pins (`examples/damonbarry-mio/Cargo.toml`). Process-
//! wide `WSAStartup`/`WSACleanup` is out of scope (spec §1); callers are
//! expected to have already initialized Winsock the way any Windows
//! sockets program does (`std::net` does this once lazily, and linking it
//! is enough -- this crate relies on that to avoid re-implementing
//! startup/cleanup bookkeeping).

use std::ffi::CString;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

use winapi::{c_int, SOCKET};

use crate::address::Address;
use crate::error::{SocketError, SocketResult};
use crate::sys::Interest;

/// Native descriptor type on Windows: a `SOCKET` handle.
pub type RawSocket = SOCKET;

/// Sentinel "no descriptor" value (`INVALID_SOCKET`).
pub const INVALID_SOCKET: RawSocket = winapi::INVALID_SOCKET;

/// `FD_SETSIZE` as Winsock's `select()` compiles it; sockets at or past
/// this many open handles can't be watched by `select()` at all (spec
/// §4.3, `DescriptorTooLarge`).
pub const FD_SETSIZE: usize = 64;

fn last_error() -> SocketError {
    SocketError::from_last_os_error()
}

/// Closes `sock`, propagating any error.
pub fn close(sock: RawSocket) -> SocketResult<()> {
    if unsafe { ws2_32::closesocket(sock) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

/// Best-effort close used from destructors.
pub fn try_close_noexcept(sock: RawSocket) {
    if sock != INVALID_SOCKET && unsafe { ws2_32::closesocket(sock) } == winapi::SOCKET_ERROR {
        log::warn!("closesocket() failed in destructor: {}", io::Error::last_os_error());
    }
}

/// Sets `FIONBIO`, returning the previous mode. Winsock doesn't expose a
/// way to *query* blocking mode directly, so -- mirroring
/// `original_source/internal/ScopedBlockingMode.hpp`'s Windows branch --
/// this tracks mode via a zero-length `FIONBIO` probe is not possible;
/// instead callers that need the previous mode must track it themselves
/// (see [`crate::blocking::ScopedBlockingMode`]).
pub fn set_nonblocking(sock: RawSocket, nonblocking: bool) -> SocketResult<()> {
    let mut mode: winapi::u_long = if nonblocking { 1 } else { 0 };
    if unsafe { ws2_32::ioctlsocket(sock, winapi::FIONBIO, &mut mode) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

/// Number of bytes queued in the receive buffer (`FIONREAD`).
pub fn fionread(sock: RawSocket) -> SocketResult<usize> {
    let mut n: winapi::u_long = 0;
    if unsafe { ws2_32::ioctlsocket(sock, winapi::FIONREAD, &mut n) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(n as usize)
}

/// `select()`-based readiness wait. Windows has no `poll()` equivalent in
/// this crate's chosen stack, so `select()` is used directly and sockets
/// past [`FD_SETSIZE`] are rejected up front (spec §4.3).
pub fn wait_ready(sock: RawSocket, interest: Interest, timeout: Option<Duration>) -> SocketResult<bool> {
    if sock as usize >= FD_SETSIZE {
        return Err(SocketError::DescriptorTooLarge);
    }

    let deadline = timeout.map(|d| Instant::now() + d);
    loop {
        let mut readfds = zeroed_fd_set();
        let mut writefds = zeroed_fd_set();
        if interest.readable {
            fd_set_add(&mut readfds, sock);
        }
        if interest.writable {
            fd_set_add(&mut writefds, sock);
        }

        let mut tv_storage;
        let tv_ptr: *mut winapi::TIMEVAL = match deadline {
            None => std::ptr::null_mut(),
            Some(dl) => {
                let now = Instant::now();
                if now >= dl {
                    return Ok(false);
                }
                let remaining = dl - now;
                tv_storage = winapi::TIMEVAL {
                    tv_sec: remaining.as_secs() as i32,
                    tv_usec: remaining.subsec_micros() as i32,
                };
                &mut tv_storage as *mut _
            }
        };

        let rc = unsafe {
            ws2_32::select(
                0, // ignored on Windows
                &mut readfds,
                &mut writefds,
                std::ptr::null_mut(),
                tv_ptr,
            )
        };
        if rc == winapi::SOCKET_ERROR {
            return Err(last_error());
        }
        if rc == 0 {
            return Ok(false);
        }
        return Ok(true);
    }
}

fn zeroed_fd_set() -> winapi::fd_set {
    unsafe { std::mem::zeroed() }
}

fn fd_set_add(set: &mut winapi::fd_set, sock: RawSocket) {
    let idx = set.fd_count as usize;
    set.fd_array[idx] = sock;
    set.fd_count += 1;
}

/// Resolver error text. `gai_strerrorA` isn't part of every Winsock
/// import set this crate's pinned `ws2_32-sys` exposes, so this falls
/// back to a generic rendering of the `EAI_*` numeric code, matching the
/// degraded case `original_source/common.hpp` documents for platforms
/// without a resolver-specific string table entry.
pub fn gai_strerror(code: i32) -> String {
    format!("name resolution failed (EAI code {code})")
}

/// Generic integer `setsockopt`.
pub fn setsockopt_int(sock: RawSocket, level: c_int, name: c_int, value: c_int) -> SocketResult<()> {
    let rc = unsafe {
        ws2_32::setsockopt(
            sock,
            level,
            name,
            &value as *const _ as *const i8,
            std::mem::size_of::<c_int>() as c_int,
        )
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn getsockopt_int(sock: RawSocket, level: c_int, name: c_int) -> SocketResult<c_int> {
    let mut value: c_int = 0;
    let mut len = std::mem::size_of::<c_int>() as c_int;
    let rc = unsafe {
        ws2_32::getsockopt(sock, level, name, &mut value as *mut _ as *mut i8, &mut len)
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(value)
}

pub fn setsockopt_raw<T>(sock: RawSocket, level: c_int, name: c_int, value: &T) -> SocketResult<()> {
    let rc = unsafe {
        ws2_32::setsockopt(
            sock,
            level,
            name,
            value as *const T as *const i8,
            std::mem::size_of::<T>() as c_int,
        )
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn setsockopt_timeval(sock: RawSocket, level: c_int, name: c_int, dur: Option<Duration>) -> SocketResult<()> {
    // Windows takes SO_RCVTIMEO/SO_SNDTIMEO as a plain DWORD of milliseconds,
    // unlike POSIX's `timeval` (spec §4.2, "Timeouts").
    let ms: winapi::DWORD = dur.map(|d| d.as_millis().min(u32::MAX as u128) as u32).unwrap_or(0);
    setsockopt_int(sock, level, name, ms as c_int).map(|_| ())
}

pub fn getsockopt_timeval(sock: RawSocket, level: c_int, name: c_int) -> SocketResult<Option<Duration>> {
    let ms = getsockopt_int(sock, level, name)? as u64;
    if ms == 0 {
        return Ok(None);
    }
    Ok(Some(Duration::from_millis(ms)))
}

/// Synchronous scatter read via `WSARecv` with no overlapped structure.
pub fn readv(sock: RawSocket, bufs: &mut [&mut [u8]]) -> SocketResult<usize> {
    let mut wsabufs: Vec<winapi::WSABUF> = bufs
        .iter_mut()
        .map(|b| winapi::WSABUF { len: b.len() as u_long_compat, buf: b.as_mut_ptr() as *mut i8 })
        .collect();
    let mut received: winapi::DWORD = 0;
    let mut flags: winapi::DWORD = 0;
    let rc = unsafe {
        ws2_32::WSARecv(
            sock,
            wsabufs.as_mut_ptr(),
            wsabufs.len() as winapi::DWORD,
            &mut received,
            &mut flags,
            std::ptr::null_mut(),
            None,
        )
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(received as usize)
}

/// Synchronous gather write via `WSASend` with no overlapped structure.
pub fn writev(sock: RawSocket, bufs: &[&[u8]]) -> SocketResult<usize> {
    let wsabufs: Vec<winapi::WSABUF> = bufs
        .iter()
        .map(|b| winapi::WSABUF { len: b.len() as u_long_compat, buf: b.as_ptr() as *mut i8 })
        .collect();
    let mut sent: winapi::DWORD = 0;
    let rc = unsafe {
        ws2_32::WSASend(
            sock,
            wsabufs.as_ptr() as *mut winapi::WSABUF,
            wsabufs.len() as winapi::DWORD,
            &mut sent,
            0,
            std::ptr::null_mut(),
            None,
        )
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(sent as usize)
}

type u_long_compat = winapi::u_long;

pub fn send(sock: RawSocket, buf: &[u8], flags: c_int) -> SocketResult<usize> {
    let rc = unsafe { ws2_32::send(sock, buf.as_ptr() as *const i8, buf.len() as c_int, flags) };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(rc as usize)
}

pub fn recv(sock: RawSocket, buf: &mut [u8], flags: c_int) -> SocketResult<usize> {
    let rc = unsafe { ws2_32::recv(sock, buf.as_mut_ptr() as *mut i8, buf.len() as c_int, flags) };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(rc as usize)
}

/// `AF_UNIX`, as the Windows 10 1803+ `afunix.h` header defines it. Not
/// present in the `winapi` 0.2.x bundle this crate pins, so it's defined
/// here directly -- this is the one constant the teacher's own
/// `mio-uds-windows` crate exists to paper over (its public
/// `UnixListener`/`UnixStream` predate native Windows `AF_UNIX` and fall
/// back to TCP-over-loopback; this crate targets "AF_UNIX on modern
/// Windows" per spec §1 and uses the real thing).
pub const AF_UNIX: c_int = 1;

const UNIX_PATH_MAX: usize = 108;

#[repr(C)]
struct SockaddrUn {
    sun_family: winapi::ADDRESS_FAMILY,
    sun_path: [i8; UNIX_PATH_MAX],
}

/// One candidate produced by [`resolve`].
pub struct ResolvedRaw {
    pub family: c_int,
    pub socket_type: c_int,
    pub protocol: c_int,
    pub address: Address,
}

/// `getaddrinfo`-based resolution (spec §4.1). Same contract as the POSIX
/// counterpart: `numeric_only` sets `AI_NUMERICHOST`, `passive` sets
/// `AI_PASSIVE`.
pub fn resolve(
    host: &str,
    port: u16,
    family: c_int,
    socket_type: c_int,
    protocol: c_int,
    passive: bool,
    numeric_only: bool,
) -> Result<Vec<ResolvedRaw>, i32> {
    let mut hints: winapi::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_family = family;
    hints.ai_socktype = socket_type;
    hints.ai_protocol = protocol;
    hints.ai_flags = (if passive { winapi::AI_PASSIVE } else { 0 })
        | (if numeric_only { winapi::AI_NUMERICHOST } else { 0 });

    let host_cstr = if host.is_empty() { None } else { CString::new(host).ok() };
    let service = match CString::new(port.to_string()) {
        Ok(s) => s,
        Err(_) => return Err(-1),
    };

    let mut raw: *mut winapi::addrinfo = std::ptr::null_mut();
    let host_ptr = host_cstr.as_ref().map(|c| c.as_ptr()).unwrap_or(std::ptr::null());
    let rc = unsafe { ws2_32::getaddrinfo(host_ptr, service.as_ptr(), &hints, &mut raw) };
    if rc != 0 {
        return Err(rc);
    }

    let mut out = Vec::new();
    let mut cur = raw;
    while !cur.is_null() {
        let info = unsafe { &*cur };
        if let Some(address) = unsafe { sockaddr_to_address(info.ai_addr, info.ai_addrlen as usize) } {
            out.push(ResolvedRaw {
                family: info.ai_family,
                socket_type: info.ai_socktype,
                protocol: info.ai_protocol,
                address,
            });
        }
        cur = info.ai_next;
    }
    unsafe { ws2_32::freeaddrinfo(raw) };
    Ok(out)
}

/// # Safety
/// `ptr` must point to at least `len` valid bytes of a `sockaddr`.
pub unsafe fn sockaddr_to_address(ptr: *const winapi::sockaddr, len: usize) -> Option<Address> {
    if ptr.is_null() || len == 0 {
        return None;
    }
    match (*ptr).sa_family as c_int {
        x if x == winapi::AF_INET as c_int => {
            let sin = &*(ptr as *const winapi::sockaddr_in);
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.S_un));
            Some(Address::V4 { ip, port: u16::from_be(sin.sin_port) })
        }
        x if x == winapi::AF_INET6 as c_int => {
            let sin6 = &*(ptr as *const winapi::sockaddr_in6);
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            Some(Address::V6 {
                ip,
                port: u16::from_be(sin6.sin6_port),
                scope_id: sin6.sin6_scope_id,
                flow_info: sin6.sin6_flowinfo,
            })
        }
        _ => None,
    }
}

pub fn address_to_sockaddr(addr: &Address) -> SocketResult<(winapi::SOCKADDR_STORAGE, c_int)> {
    let mut storage: winapi::SOCKADDR_STORAGE = unsafe { std::mem::zeroed() };
    let len = match *addr {
        Address::V4 { ip, port } => {
            let sin = winapi::sockaddr_in {
                sin_family: winapi::AF_INET as winapi::ADDRESS_FAMILY,
                sin_port: port.to_be(),
                sin_addr: winapi::in_addr { S_un: u32::from(ip).to_be() },
                sin_zero: [0; 8],
            };
            unsafe { std::ptr::write(&mut storage as *mut _ as *mut winapi::sockaddr_in, sin) };
            std::mem::size_of::<winapi::sockaddr_in>()
        }
        Address::V6 { ip, port, scope_id, flow_info } => {
            let sin6 = winapi::sockaddr_in6 {
                sin6_family: winapi::AF_INET6 as winapi::ADDRESS_FAMILY,
                sin6_port: port.to_be(),
                sin6_flowinfo: flow_info,
                sin6_addr: winapi::in6_addr { s6_addr: ip.octets() },
                sin6_scope_id: scope_id,
            };
            unsafe { std::ptr::write(&mut storage as *mut _ as *mut winapi::sockaddr_in6, sin6) };
            std::mem::size_of::<winapi::sockaddr_in6>()
        }
        Address::Unix(_) => return Err(SocketError::Unsupported("use sockaddr_un encoding for AF_UNIX".into())),
    };
    Ok((storage, len as c_int))
}

pub fn socket(family: c_int, socket_type: c_int, protocol: c_int) -> SocketResult<RawSocket> {
    let sock = unsafe { ws2_32::socket(family, socket_type, protocol) };
    if sock == INVALID_SOCKET {
        return Err(last_error());
    }
    Ok(sock)
}

pub fn bind(sock: RawSocket, addr: &Address) -> SocketResult<()> {
    let (storage, len) = address_to_sockaddr(addr)?;
    let rc = unsafe { ws2_32::bind(sock, &storage as *const _ as *const winapi::sockaddr, len) };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn listen(sock: RawSocket, backlog: i32) -> SocketResult<()> {
    if unsafe { ws2_32::listen(sock, backlog) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn accept(sock: RawSocket) -> SocketResult<(RawSocket, Address)> {
    let mut storage: winapi::SOCKADDR_STORAGE = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<winapi::SOCKADDR_STORAGE>() as c_int;
    let accepted = unsafe { ws2_32::accept(sock, &mut storage as *mut _ as *mut winapi::sockaddr, &mut len) };
    if accepted == INVALID_SOCKET {
        return Err(last_error());
    }
    let addr = unsafe { sockaddr_to_address(&storage as *const _ as *const winapi::sockaddr, len as usize) }
        .unwrap_or(Address::wildcard_v4(0));
    Ok((accepted, addr))
}

pub fn connect(sock: RawSocket, addr: &Address) -> io::Result<()> {
    let (storage, len) = address_to_sockaddr(addr).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let rc = unsafe { ws2_32::connect(sock, &storage as *const _ as *const winapi::sockaddr, len) };
    if rc == winapi::SOCKET_ERROR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn sendto(sock: RawSocket, buf: &[u8], addr: &Address) -> SocketResult<usize> {
    let (storage, len) = address_to_sockaddr(addr)?;
    let rc = unsafe {
        ws2_32::sendto(
            sock,
            buf.as_ptr() as *const i8,
            buf.len() as c_int,
            0,
            &storage as *const _ as *const winapi::sockaddr,
            len,
        )
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(rc as usize)
}

pub fn recvfrom(sock: RawSocket, buf: &mut [u8], flags: c_int) -> SocketResult<(usize, Address)> {
    let mut storage: winapi::SOCKADDR_STORAGE = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<winapi::SOCKADDR_STORAGE>() as c_int;
    let rc = unsafe {
        ws2_32::recvfrom(
            sock,
            buf.as_mut_ptr() as *mut i8,
            buf.len() as c_int,
            flags,
            &mut storage as *mut _ as *mut winapi::sockaddr,
            &mut len,
        )
    };
    if rc == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    let addr = unsafe { sockaddr_to_address(&storage as *const _ as *const winapi::sockaddr, len as usize) }
        .unwrap_or(Address::wildcard_v4(0));
    Ok((rc as usize, addr))
}

pub fn local_addr(sock: RawSocket) -> SocketResult<Address> {
    let mut storage: winapi::SOCKADDR_STORAGE = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<winapi::SOCKADDR_STORAGE>() as c_int;
    if unsafe { ws2_32::getsockname(sock, &mut storage as *mut _ as *mut winapi::sockaddr, &mut len) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    unsafe { sockaddr_to_address(&storage as *const _ as *const winapi::sockaddr, len as usize) }
        .ok_or_else(|| SocketError::Unsupported("unrecognized address family".into()))
}

pub fn peer_addr(sock: RawSocket) -> SocketResult<Address> {
    let mut storage: winapi::SOCKADDR_STORAGE = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<winapi::SOCKADDR_STORAGE>() as c_int;
    if unsafe { ws2_32::getpeername(sock, &mut storage as *mut _ as *mut winapi::sockaddr, &mut len) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    unsafe { sockaddr_to_address(&storage as *const _ as *const winapi::sockaddr, len as usize) }
        .ok_or_else(|| SocketError::Unsupported("unrecognized address family".into()))
}

pub fn shutdown(sock: RawSocket, how: c_int) -> SocketResult<()> {
    if unsafe { ws2_32::shutdown(sock, how) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

fn unix_sockaddr(path: &std::path::Path) -> SocketResult<(SockaddrUn, c_int)> {
    let text = path.to_str().ok_or_else(|| SocketError::InvalidArgument("AF_UNIX path is not valid UTF-8".into()))?;
    if text.len() >= UNIX_PATH_MAX {
        return Err(SocketError::InvalidArgument("AF_UNIX path too long".into()));
    }
    let mut addr = SockaddrUn { sun_family: AF_UNIX as winapi::ADDRESS_FAMILY, sun_path: [0; UNIX_PATH_MAX] };
    for (dst, src) in addr.sun_path.iter_mut().zip(text.as_bytes().iter()) {
        *dst = *src as i8;
    }
    let len = (std::mem::size_of::<winapi::ADDRESS_FAMILY>() + text.len() + 1) as c_int;
    Ok((addr, len))
}

pub fn unix_bind(sock: RawSocket, path: &std::path::Path) -> SocketResult<()> {
    let (addr, len) = unix_sockaddr(path)?;
    if unsafe { ws2_32::bind(sock, &addr as *const _ as *const winapi::sockaddr, len) } == winapi::SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn unix_connect(sock: RawSocket, path: &std::path::Path) -> io::Result<()> {
    let (addr, len) = unix_sockaddr(path).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    if unsafe { ws2_32::connect(sock, &addr as *const _ as *const winapi::sockaddr, len) } == winapi::SOCKET_ERROR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
