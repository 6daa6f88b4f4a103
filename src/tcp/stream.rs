//! Stream Connection (spec §4.4, component C4 -- the largest single
//! component in the system). Grounded on
//! `examples/damonbarry-mio/src/stream.rs`'s `UnixStream` (connect,
//! `set_nodelay`/`keepalive`/buffer-size forwarding, `Read`/`Write` impls)
//! and on `original_source/include/jsocketpp/Socket.hpp`'s read/write
//! primitive surface, which this module reproduces primitive-for-primitive
//! against this crate's own synchronous `sys` layer instead of `recv`/`send`
//! wrapped by `std::net::TcpStream`.

use std::time::{Duration, Instant};

use crate::address::Address;
use crate::blocking::ScopedBlockingMode;
use crate::buf::{ReceiveBuffer, WriteBuf};
use crate::error::{SocketError, SocketResult};
use crate::handle::SocketHandle;
use crate::options::{SocketOptions, SocketTuning};
use crate::resolve;
use crate::sys::{self, Interest, RawSocket};

/// Lifecycle state of a [`TcpStream`] (spec §3 "StreamConnection state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Connected,
    HalfClosedRead,
    HalfClosedWrite,
    Closed,
}

/// Which direction(s) [`TcpStream::shutdown`] closes (spec §4.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    Read,
    Write,
    Both,
}

#[cfg(unix)]
fn shutdown_how(mode: ShutdownMode) -> libc::c_int {
    match mode {
        ShutdownMode::Read => libc::SHUT_RD,
        ShutdownMode::Write => libc::SHUT_WR,
        ShutdownMode::Both => libc::SHUT_RDWR,
    }
}

#[cfg(windows)]
fn shutdown_how(mode: ShutdownMode) -> i32 {
    match mode {
        ShutdownMode::Read => 0,  // SD_RECEIVE
        ShutdownMode::Write => 1, // SD_SEND
        ShutdownMode::Both => 2,  // SD_BOTH
    }
}

/// A fixed-width unsigned integer usable as a length prefix for
/// `write_prefixed`/`read_prefixed` (spec §4.4.2, §4.4.3). Prefixes are
/// transmitted in host byte order by default (spec §9).
pub trait Prefix: Copy {
    const SIZE: usize;
    fn to_ne_bytes_vec(self) -> Vec<u8>;
    fn from_ne_bytes_vec(bytes: &[u8]) -> Self;
    fn to_payload_len(self) -> SocketResult<usize>;
    fn from_payload_len(len: usize) -> SocketResult<Self>;
}

macro_rules! impl_prefix {
    ($t:ty) => {
        impl Prefix for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn to_ne_bytes_vec(self) -> Vec<u8> {
                self.to_ne_bytes().to_vec()
            }

            fn from_ne_bytes_vec(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_ne_bytes(buf)
            }

            fn to_payload_len(self) -> SocketResult<usize> {
                Ok(self as usize)
            }

            fn from_payload_len(len: usize) -> SocketResult<Self> {
                <$t>::try_from(len).map_err(|_| SocketError::PayloadTooLarge {
                    size: len,
                    limit: <$t>::MAX as usize,
                })
            }
        }
    };
}

impl_prefix!(u8);
impl_prefix!(u16);
impl_prefix!(u32);
impl_prefix!(u64);

/// A connected TCP socket (spec §3, §4.4).
#[derive(Debug)]
pub struct TcpStream {
    handle: SocketHandle,
    state: ConnectionState,
    peer: Option<Address>,
    recv_buf: ReceiveBuffer,
}

impl TcpStream {
    /// Blocking connect: resolves `host`/`port` and establishes a session
    /// with no timeout, propagating any resolution or connect error (spec
    /// §4.4.1, "Timeout < 0").
    pub fn connect(host: &str, port: u16) -> SocketResult<TcpStream> {
        Self::connect_timeout(host, port, None, &SocketTuning::default())
    }

    /// Connects with an optional timeout in milliseconds (spec §4.4.1).
    /// `None` blocks; `Some(ms)` temporarily flips the socket non-blocking
    /// via a [`ScopedBlockingMode`] guard, initiates the connect, waits for
    /// writability, then verifies success via `SO_ERROR`.
    pub fn connect_timeout(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        tuning: &SocketTuning,
    ) -> SocketResult<TcpStream> {
        #[cfg(unix)]
        let family_any = libc::AF_UNSPEC;
        #[cfg(windows)]
        let family_any = 0;
        #[cfg(unix)]
        let sock_stream = libc::SOCK_STREAM;
        #[cfg(windows)]
        let sock_stream = 1; // SOCK_STREAM

        let candidates = resolve::resolve(host, port, family_any, sock_stream, 0, false, false)?;
        let candidate = candidates.first().ok_or_else(|| {
            SocketError::InvalidArgument(format!("no resolvable address for {host}:{port}"))
        })?;

        let sock = sys::socket(candidate.family, candidate.socket_type, candidate.protocol)?;
        let handle = SocketHandle::from_raw(sock);

        match timeout {
            None => {
                sys::connect(sock, &candidate.address).map_err(SocketError::from)?;
            }
            Some(dur) => {
                let _guard = ScopedBlockingMode::new(&handle, true)?;
                match sys::connect(sock, &candidate.address) {
                    Ok(()) => {}
                    Err(e) if would_block(&e) => {
                        let ready = sys::wait_ready(sock, Interest::WRITABLE, Some(dur))?;
                        if !ready {
                            return Err(SocketError::Timeout);
                        }
                        check_so_error(sock)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let options = SocketOptions::new(sock, false);
        tuning.apply(&options)?;

        Ok(TcpStream {
            handle,
            state: ConnectionState::Connected,
            peer: Some(candidate.address.clone()),
            recv_buf: ReceiveBuffer::new(tuning.internal_buffer_size),
        })
    }

    /// Wraps an already-connected raw descriptor, as produced by
    /// `TcpListener::accept` (spec §4.3).
    pub(crate) fn from_connected(sock: RawSocket, peer: Address, tuning: &SocketTuning) -> SocketResult<TcpStream> {
        let handle = SocketHandle::from_raw(sock);
        let options = SocketOptions::new(sock, false);
        tuning.apply(&options)?;
        if tuning.nonblocking {
            handle.set_nonblocking(true)?;
        }
        Ok(TcpStream {
            handle,
            state: ConnectionState::Connected,
            peer: Some(peer),
            recv_buf: ReceiveBuffer::new(tuning.internal_buffer_size),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn peer_addr(&self) -> Option<&Address> {
        self.peer.as_ref()
    }

    pub fn local_addr(&self) -> SocketResult<Address> {
        sys::local_addr(self.handle.raw())
    }

    pub fn options(&self) -> SocketOptions {
        SocketOptions::new(self.handle.raw(), false)
    }

    fn require_connected(&self) -> SocketResult<RawSocket> {
        if self.handle.is_closed() {
            return Err(SocketError::InvalidState("socket is closed".into()));
        }
        Ok(self.handle.raw())
    }

    // ---- Read primitives (spec §4.4.2) ----

    /// Reads a fixed-size, trivially-copyable value, assembling it across
    /// multiple `recv` calls as needed. Never returns a partial value.
    pub fn read_value<T: Copy>(&mut self) -> SocketResult<T> {
        let mut storage = std::mem::MaybeUninit::<T>::uninit();
        let n = std::mem::size_of::<T>();
        let buf = unsafe { std::slice::from_raw_parts_mut(storage.as_mut_ptr() as *mut u8, n) };
        self.read_into_exact(buf)?;
        Ok(unsafe { storage.assume_init() })
    }

    /// Single `recv` into the internal buffer, returned as a `String`
    /// (lossy on invalid UTF-8).
    pub fn read_string(&mut self) -> SocketResult<String> {
        let sock = self.require_connected()?;
        let n = sys::recv(sock, self.recv_buf.as_mut_slice(), 0)?;
        if n == 0 {
            return Err(SocketError::Closed);
        }
        Ok(String::from_utf8_lossy(&self.recv_buf.as_slice()[..n]).into_owned())
    }

    pub fn read_exact(&mut self, n: usize) -> SocketResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_into_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_at_most(&mut self, n: usize) -> SocketResult<Vec<u8>> {
        let sock = self.require_connected()?;
        let mut buf = vec![0u8; n];
        let read = sys::recv(sock, &mut buf, 0)?;
        if read == 0 && n != 0 {
            return Err(SocketError::Closed);
        }
        buf.truncate(read);
        Ok(buf)
    }

    pub fn read_at_most_with_timeout(&mut self, n: usize, timeout: Duration) -> SocketResult<Vec<u8>> {
        let sock = self.require_connected()?;
        if !sys::wait_ready(sock, Interest::READABLE, Some(timeout))? {
            return Err(SocketError::Timeout);
        }
        self.read_at_most(n)
    }

    /// Reads every byte already queued in the OS receive buffer via
    /// `FIONREAD`, in a single `recv` (spec §4.4.2). May return empty.
    #[cfg(unix)]
    pub fn read_available(&mut self) -> SocketResult<Vec<u8>> {
        let sock = self.require_connected()?;
        let queued = sys::fionread(sock)?;
        if queued == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; queued];
        let n = sys::recv(sock, &mut buf, 0)?;
        buf.truncate(n);
        Ok(buf)
    }

    #[cfg(windows)]
    pub fn read_available(&mut self) -> SocketResult<Vec<u8>> {
        let sock = self.require_connected()?;
        let queued = sys::fionread(sock)?;
        if queued == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; queued];
        let n = sys::recv(sock, &mut buf, 0)?;
        buf.truncate(n);
        Ok(buf)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> SocketResult<usize> {
        let sock = self.require_connected()?;
        let n = sys::recv(sock, buf, 0)?;
        if n == 0 && !buf.is_empty() {
            return Err(SocketError::Closed);
        }
        Ok(n)
    }

    pub fn read_into_exact(&mut self, buf: &mut [u8]) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = sys::recv(sock, &mut buf[filled..], 0)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            filled += n;
        }
        Ok(())
    }

    /// Reads byte-by-byte until `delim` or `max_len` is reached (spec
    /// §4.4.2, §8 "no occurrence of `delim`", "`delim` was consumed").
    pub fn read_until(&mut self, delim: u8, max_len: usize, include_delim: bool) -> SocketResult<Vec<u8>> {
        let sock = self.require_connected()?;
        if max_len == 0 {
            return Err(SocketError::MaxExceeded { max_len: 0 });
        }
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = sys::recv(sock, &mut byte, 0)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            if byte[0] == delim {
                if include_delim {
                    out.push(delim);
                }
                return Ok(out);
            }
            out.push(byte[0]);
            if out.len() >= max_len {
                return Err(SocketError::MaxExceeded { max_len });
            }
        }
    }

    pub fn read_line(&mut self, max_len: usize, include_delim: bool) -> SocketResult<String> {
        let bytes = self.read_until(b'\n', max_len, include_delim)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads an integer prefix `P`, then that many payload bytes.
    pub fn read_prefixed<P: Prefix>(&mut self) -> SocketResult<Vec<u8>> {
        let mut prefix_bytes = vec![0u8; P::SIZE];
        self.read_into_exact(&mut prefix_bytes)?;
        let prefix = P::from_ne_bytes_vec(&prefix_bytes);
        let len = prefix.to_payload_len()?;
        self.read_exact(len)
    }

    /// Bounded variant: fails with [`SocketError::PayloadTooLarge`] if the
    /// decoded prefix exceeds `max_payload`.
    pub fn read_prefixed_bounded<P: Prefix>(&mut self, max_payload: usize) -> SocketResult<Vec<u8>> {
        let mut prefix_bytes = vec![0u8; P::SIZE];
        self.read_into_exact(&mut prefix_bytes)?;
        let prefix = P::from_ne_bytes_vec(&prefix_bytes);
        let len = prefix.to_payload_len()?;
        if len > max_payload {
            return Err(SocketError::PayloadTooLarge { size: len, limit: max_payload });
        }
        self.read_exact(len)
    }

    pub fn peek(&mut self, n: usize) -> SocketResult<Vec<u8>> {
        let sock = self.require_connected()?;
        let mut buf = vec![0u8; n];
        let read = sys::recv(sock, &mut buf, peek_flag())?;
        if read == 0 && n != 0 {
            return Err(SocketError::Closed);
        }
        buf.truncate(read);
        Ok(buf)
    }

    /// Reads and drops exactly `n` bytes, using a small chunked scratch
    /// buffer rather than allocating `n` bytes up front (spec §4.4.2).
    pub fn discard(&mut self, n: usize) -> SocketResult<()> {
        const CHUNK: usize = 1024;
        let sock = self.require_connected()?;
        let mut scratch = [0u8; CHUNK];
        let mut remaining = n;
        while remaining > 0 {
            let want = remaining.min(CHUNK);
            let got = sys::recv(sock, &mut scratch[..want], 0)?;
            if got == 0 {
                return Err(SocketError::Closed);
            }
            remaining -= got;
        }
        Ok(())
    }

    pub fn readv(&mut self, bufs: &mut [&mut [u8]]) -> SocketResult<usize> {
        let sock = self.require_connected()?;
        let n = sys::readv(sock, bufs)?;
        if n == 0 && bufs.iter().any(|b| !b.is_empty()) {
            return Err(SocketError::Closed);
        }
        Ok(n)
    }

    /// Retries `readv` until every buffer slot is filled (spec §4.4.2,
    /// §8 invariant 5).
    pub fn readv_all(&mut self, bufs: &mut [&mut [u8]]) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let mut filled = 0;
        let mut owned: Vec<Vec<u8>> = bufs.iter().map(|b| vec![0u8; b.len()]).collect();
        while filled < total {
            let mut remaining = remaining_read_views(&mut owned, filled);
            let n = sys::readv(sock, &mut remaining)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            filled += n;
        }
        for (dst, src) in bufs.iter_mut().zip(owned.iter()) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    pub fn readv_all_with_total_timeout(&mut self, bufs: &mut [&mut [u8]], timeout: Duration) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let deadline = Instant::now() + timeout;
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let mut filled = 0;
        let mut owned: Vec<Vec<u8>> = bufs.iter().map(|b| vec![0u8; b.len()]).collect();
        while filled < total {
            let now = Instant::now();
            if now >= deadline {
                return Err(SocketError::Timeout);
            }
            if !sys::wait_ready(sock, Interest::READABLE, Some(deadline - now))? {
                return Err(SocketError::Timeout);
            }
            let mut remaining = remaining_read_views(&mut owned, filled);
            let n = sys::readv(sock, &mut remaining)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            filled += n;
        }
        for (dst, src) in bufs.iter_mut().zip(owned.iter()) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    pub fn readv_at_most_with_timeout(&mut self, bufs: &mut [&mut [u8]], timeout: Duration) -> SocketResult<usize> {
        let sock = self.require_connected()?;
        if !sys::wait_ready(sock, Interest::READABLE, Some(timeout))? {
            return Err(SocketError::Timeout);
        }
        self.readv_impl(sock, bufs)
    }

    fn readv_impl(&self, sock: RawSocket, bufs: &mut [&mut [u8]]) -> SocketResult<usize> {
        let n = sys::readv(sock, bufs)?;
        if n == 0 && bufs.iter().any(|b| !b.is_empty()) {
            return Err(SocketError::Closed);
        }
        Ok(n)
    }

    // ---- Write primitives (spec §4.4.3) ----

    pub fn write<'a>(&mut self, data: impl Into<WriteBuf<'a>>) -> SocketResult<usize> {
        let sock = self.require_connected()?;
        let wb = data.into();
        sys::send(sock, wb.as_slice(), 0)
    }

    pub fn write_all<'a>(&mut self, data: impl Into<WriteBuf<'a>>) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let wb = data.into();
        let slice = wb.as_slice();
        let mut sent = 0;
        while sent < slice.len() {
            let n = sys::send(sock, &slice[sent..], 0)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            sent += n;
        }
        Ok(())
    }

    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes.
    pub unsafe fn write_from(&mut self, ptr: *const u8, len: usize) -> SocketResult<usize> {
        self.write(WriteBuf::from_raw(ptr, len))
    }

    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes.
    pub unsafe fn write_from_all(&mut self, ptr: *const u8, len: usize) -> SocketResult<()> {
        self.write_all(WriteBuf::from_raw(ptr, len))
    }

    pub fn write_prefixed<P: Prefix>(&mut self, payload: &[u8]) -> SocketResult<()> {
        let prefix = P::from_payload_len(payload.len())?;
        self.write_all(prefix.to_ne_bytes_vec().as_slice())?;
        self.write_all(payload)
    }

    pub fn writev(&mut self, bufs: &[&[u8]]) -> SocketResult<usize> {
        let sock = self.require_connected()?;
        sys::writev(sock, bufs)
    }

    /// Retries on partial send: recomputes remaining slices by counting
    /// fully-sent views and trimming the first partial one (spec §4.4.3).
    pub fn writev_all(&mut self, bufs: &[&[u8]]) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let mut sent_total = 0;
        let owned: Vec<Vec<u8>> = bufs.iter().map(|b| b.to_vec()).collect();
        while sent_total < total {
            let remaining = remaining_views(&owned, sent_total);
            let refs: Vec<&[u8]> = remaining.iter().map(|v| v.as_slice()).collect();
            let n = sys::writev(sock, &refs)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            sent_total += n;
        }
        Ok(())
    }

    pub fn write_at_most_with_timeout<'a>(&mut self, data: impl Into<WriteBuf<'a>>, timeout: Duration) -> SocketResult<usize> {
        let sock = self.require_connected()?;
        if !sys::wait_ready(sock, Interest::WRITABLE, Some(timeout))? {
            return Err(SocketError::Timeout);
        }
        let wb = data.into();
        sys::send(sock, wb.as_slice(), 0)
    }

    pub fn write_with_total_timeout<'a>(&mut self, data: impl Into<WriteBuf<'a>>, timeout: Duration) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let wb = data.into();
        let slice = wb.as_slice();
        let deadline = Instant::now() + timeout;
        let mut sent = 0;
        while sent < slice.len() {
            let now = Instant::now();
            if now >= deadline {
                return Err(SocketError::Timeout);
            }
            if !sys::wait_ready(sock, Interest::WRITABLE, Some(deadline - now))? {
                return Err(SocketError::Timeout);
            }
            let n = sys::send(sock, &slice[sent..], 0)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            sent += n;
        }
        Ok(())
    }

    pub fn writev_with_total_timeout(&mut self, bufs: &[&[u8]], timeout: Duration) -> SocketResult<()> {
        let sock = self.require_connected()?;
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let owned: Vec<Vec<u8>> = bufs.iter().map(|b| b.to_vec()).collect();
        let deadline = Instant::now() + timeout;
        let mut sent_total = 0;
        while sent_total < total {
            let now = Instant::now();
            if now >= deadline {
                return Err(SocketError::Timeout);
            }
            if !sys::wait_ready(sock, Interest::WRITABLE, Some(deadline - now))? {
                return Err(SocketError::Timeout);
            }
            let remaining = remaining_views(&owned, sent_total);
            let refs: Vec<&[u8]> = remaining.iter().map(|v| v.as_slice()).collect();
            let n = sys::writev(sock, &refs)?;
            if n == 0 {
                return Err(SocketError::Closed);
            }
            sent_total += n;
        }
        Ok(())
    }

    // ---- Lifecycle (spec §4.4.4) ----

    pub fn shutdown(&mut self, mode: ShutdownMode) -> SocketResult<()> {
        let sock = self.require_connected()?;
        sys::shutdown(sock, shutdown_how(mode))?;
        self.state = match (self.state, mode) {
            (ConnectionState::Connected, ShutdownMode::Read) => ConnectionState::HalfClosedRead,
            (ConnectionState::Connected, ShutdownMode::Write) => ConnectionState::HalfClosedWrite,
            (_, ShutdownMode::Both) => ConnectionState::HalfClosedRead,
            (other, _) => other,
        };
        Ok(())
    }

    pub fn close(&mut self) -> SocketResult<()> {
        self.handle.close()?;
        self.state = ConnectionState::Closed;
        Ok(())
    }

    /// Best-effort, non-destructive liveness probe: peek one byte with a
    /// temporary non-blocking toggle (spec §4.4.4).
    pub fn is_connected(&self) -> bool {
        if self.handle.is_closed() {
            return false;
        }
        let guard = match ScopedBlockingMode::new(&self.handle, true) {
            Ok(g) => g,
            Err(_) => return false,
        };
        let mut byte = [0u8; 1];
        let result = sys::recv(self.handle.raw(), &mut byte, peek_flag());
        drop(guard);
        // A zero-length peek means the peer closed; any error here is
        // expected to be EWOULDBLOCK/EAGAIN (no data pending, still alive).
        !matches!(result, Ok(0))
    }
}

#[cfg(unix)]
fn peek_flag() -> libc::c_int {
    libc::MSG_PEEK
}

#[cfg(windows)]
fn peek_flag() -> i32 {
    0x2 // MSG_PEEK
}

#[cfg(unix)]
fn would_block(err: &io_error_compat::IoLike) -> bool {
    matches!(err.raw_os_error(), Some(libc::EINPROGRESS) | Some(libc::EWOULDBLOCK))
}

#[cfg(windows)]
fn would_block(err: &io_error_compat::IoLike) -> bool {
    err.raw_os_error().is_some()
}

mod io_error_compat {
    pub type IoLike = std::io::Error;
}

#[cfg(unix)]
fn check_so_error(sock: RawSocket) -> SocketResult<()> {
    let err = sys::getsockopt_int(sock, libc::SOL_SOCKET, libc::SO_ERROR)?;
    if err != 0 {
        let message = std::io::Error::from_raw_os_error(err).to_string();
        return Err(SocketError::IoFailed { code: err, message });
    }
    Ok(())
}

#[cfg(windows)]
fn check_so_error(sock: RawSocket) -> SocketResult<()> {
    let err = sys::getsockopt_int(sock, 0xffff, 0x1007)?; // SOL_SOCKET, SO_ERROR
    if err != 0 {
        return Err(SocketError::IoFailed { code: err, message: format!("connect failed (code {err})") });
    }
    Ok(())
}

/// Rebuilds the vectored destination, skipping `filled` bytes already
/// written into `owned` since the start of the call. Unlike slicing a
/// persistent `&mut [&mut [u8]]` in place, this re-derives every view
/// from `owned` each time, so an offset that lands inside the first
/// remaining buffer is handled the same way as one that lands past it.
fn remaining_read_views(owned: &mut [Vec<u8>], mut filled: usize) -> Vec<&mut [u8]> {
    let mut out = Vec::with_capacity(owned.len());
    for v in owned.iter_mut() {
        if filled >= v.len() {
            filled -= v.len();
        } else {
            out.push(&mut v[filled..]);
            filled = 0;
        }
    }
    out
}

fn remaining_views(owned: &[Vec<u8>], mut sent: usize) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for v in owned {
        if sent >= v.len() {
            sent -= v.len();
        } else {
            out.push(v[sent..].to_vec());
            sent = 0;
        }
    }
    out
}
