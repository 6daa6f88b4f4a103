//! Unix-Domain stream connection (spec §4.7). Reuses the TCP stream's
//! read/write primitive contract (spec §4.4.2-§4.4.4) verbatim, since the
//! source treats `UnixSocket` as "the TCP stream protocol over a
//! filesystem address family" rather than a distinct I/O model.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::address::Address;
use crate::blocking::ScopedBlockingMode;
use crate::buf::{ReceiveBuffer, WriteBuf};
use crate::error::{SocketError, SocketResult};
use crate::handle::SocketHandle;
use crate::options::{SocketOptions, SocketTuning};
use crate::sys::{self, Interest, RawSocket};
use crate::tcp::{ConnectionState, Prefix, ShutdownMode};

#[cfg(unix)]
fn af_unix() -> libc::c_int {
    libc::AF_UNIX
}
#[cfg(windows)]
fn af_unix() -> i32 {
    sys::AF_UNIX
}

#[cfg(unix)]
fn sock_stream() -> libc::c_int {
    libc::SOCK_STREAM
}
#[cfg(windows)]
fn sock_stream() -> i32 {
    1
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
        ShutdownMode::Read => 0,
        ShutdownMode::Write => 1,
        ShutdownMode::Both => 2,
    }
}

/// A connected AF_UNIX stream socket (spec §4.7).
#[derive(Debug)]
pub struct UnixStream {
    handle: SocketHandle,
    state: ConnectionState,
    peer_path: Option<PathBuf>,
    recv_buf: ReceiveBuffer,
}

impl UnixStream {
    pub fn connect(path: impl AsRef<Path>) -> SocketResult<UnixStream> {
        Self::connect_timeout(path, None, &SocketTuning::default())
    }

    pub fn connect_timeout(
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
        tuning: &SocketTuning,
    ) -> SocketResult<UnixStream> {
        let path = path.as_ref().to_path_buf();
        let sock = sys::socket(af_unix(), sock_stream(), 0)?;
        let handle = SocketHandle::from_raw(sock);

        match timeout {
            None => {
                sys::unix_connect(sock, &path).map_err(SocketError::from)?;
            }
            Some(dur) => {
                let _guard = ScopedBlockingMode::new(&handle, true)?;
                match sys::unix_connect(sock, &path) {
                    Ok(()) => {}
                    Err(e) if would_block(&e) => {
                        if !sys::wait_ready(sock, Interest::WRITABLE, Some(dur))? {
                            return Err(SocketError::Timeout);
                        }
                        check_so_error(sock)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let options = SocketOptions::new(sock, false);
        tuning.apply_unix(&options)?;

        Ok(UnixStream {
            handle,
            state: ConnectionState::Connected,
            peer_path: Some(path),
            recv_buf: ReceiveBuffer::new(tuning.internal_buffer_size),
        })
    }

    pub(crate) fn from_connected(sock: RawSocket, _peer: Address, tuning: &SocketTuning) -> SocketResult<UnixStream> {
        let handle = SocketHandle::from_raw(sock);
        let options = SocketOptions::new(sock, false);
        tuning.apply_unix(&options)?;
        if tuning.nonblocking {
            handle.set_nonblocking(true)?;
        }
        Ok(UnixStream {
            handle,
            state: ConnectionState::Connected,
            peer_path: None,
            recv_buf: ReceiveBuffer::new(tuning.internal_buffer_size),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn peer_path(&self) -> Option<&Path> {
        self.peer_path.as_deref()
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

    pub fn read_value<T: Copy>(&mut self) -> SocketResult<T> {
        let mut storage = std::mem::MaybeUninit::<T>::uninit();
        let n = std::mem::size_of::<T>();
        let buf = unsafe { std::slice::from_raw_parts_mut(storage.as_mut_ptr() as *mut u8, n) };
        self.read_into_exact(buf)?;
        Ok(unsafe { storage.assume_init() })
    }

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

    pub fn read_prefixed<P: Prefix>(&mut self) -> SocketResult<Vec<u8>> {
        let mut prefix_bytes = vec![0u8; P::SIZE];
        self.read_into_exact(&mut prefix_bytes)?;
        let prefix = P::from_ne_bytes_vec(&prefix_bytes);
        let len = prefix.to_payload_len()?;
        self.read_exact(len)
    }

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
        !matches!(result, Ok(0))
    }
}

#[cfg(unix)]
fn peek_flag() -> libc::c_int {
    libc::MSG_PEEK
}

#[cfg(windows)]
fn peek_flag() -> i32 {
    0x2
}

fn would_block(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        matches!(err.raw_os_error(), Some(libc::EINPROGRESS) | Some(libc::EWOULDBLOCK))
    }
    #[cfg(windows)]
    {
        err.raw_os_error().is_some()
    }
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
    let err = sys::getsockopt_int(sock, 0xffff, 0x1007)?;
    if err != 0 {
        return Err(SocketError::IoFailed { code: err, message: format!("connect failed (code {err})") });
    }
    Ok(())
}

/// Rebuilds the vectored destination, skipping `filled` bytes already
/// written into `owned` since the start of the call. Re-derives every
/// view from `owned` each time rather than slicing a persistent
/// `&mut [&mut [u8]]` in place, so an offset landing inside the first
/// remaining buffer is handled the same way as one landing past it.
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
