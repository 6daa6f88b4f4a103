//! Stream Server (spec §4.3, component C3). Grounded on
//! `examples/damonbarry-mio/src/listener.rs`'s `UnixListener` (resolve,
//! socket, `set_only_v6`, bind/listen, `accept`), generalized from a single
//! non-blocking `accept` call to the full blocking/timed/try/async-accept
//! contract spec §4.3 requires.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::address::Address;
use crate::error::{SocketError, SocketResult};
use crate::handle::SocketHandle;
use crate::options::{SocketOptions, SocketTuning};
use crate::resolve;
use crate::sys::{self, Interest};
use crate::tcp::stream::TcpStream;

const DEFAULT_BACKLOG: i32 = 128;

/// Lifecycle state of a [`TcpListener`] (spec §3 "StreamListener state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Created,
    Bound,
    Listening,
    Closed,
}

/// A TCP stream server (spec §4.3).
#[derive(Debug)]
pub struct TcpListener {
    handle: SocketHandle,
    state: ListenerState,
    local: Address,
    accept_timeout: Option<Duration>,
}

impl TcpListener {
    /// Builds and, unless `auto_bind_listen` is false, binds and starts
    /// listening in one step (spec §4.3 "Construction").
    ///
    /// `local_address` of `None` binds all interfaces. `accept_timeout` of
    /// `None` means "block" (spec default `-1`).
    pub fn new(
        port: u16,
        local_address: Option<&str>,
        auto_bind_listen: bool,
        reuse_address: bool,
        accept_timeout: Option<Duration>,
        dual_stack: bool,
    ) -> SocketResult<TcpListener> {
        #[cfg(unix)]
        let sock_stream = libc::SOCK_STREAM;
        #[cfg(windows)]
        let sock_stream = 1;
        #[cfg(unix)]
        let family_any = libc::AF_UNSPEC;
        #[cfg(windows)]
        let family_any = 0;

        let host = local_address.unwrap_or("");
        let candidates = resolve::resolve(host, port, family_any, sock_stream, 0, true, host.is_empty())?;

        let (sock, local) = resolve::bind_first(&candidates, |sock, candidate| {
            let options = SocketOptions::new(sock, true);
            #[cfg(unix)]
            let is_v6 = candidate.family == libc::AF_INET6;
            #[cfg(windows)]
            let is_v6 = candidate.family == winapi::AF_INET6 as i32;
            if is_v6 {
                options.set_only_v6(!dual_stack)?;
            }
            options.set_reuse_address(reuse_address)?;
            Ok(())
        })?;

        let handle = SocketHandle::from_raw(sock);
        let mut listener = TcpListener { handle, state: ListenerState::Bound, local, accept_timeout };

        if auto_bind_listen {
            sys::listen(listener.handle.raw(), DEFAULT_BACKLOG)?;
            listener.state = ListenerState::Listening;
        }
        Ok(listener)
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn local_addr(&self) -> &Address {
        &self.local
    }

    fn require_listening(&self) -> SocketResult<()> {
        if self.state != ListenerState::Listening {
            return Err(SocketError::InvalidState("listener is not listening".into()));
        }
        Ok(())
    }

    /// Accepts using the configured timeout (spec §4.3 "accept contract").
    pub fn accept(&self, tuning: &SocketTuning) -> SocketResult<TcpStream> {
        self.accept_with_timeout(self.accept_timeout, tuning)
    }

    /// Accepts with a per-call timeout overriding the configured one.
    pub fn accept_with_timeout(&self, timeout: Option<Duration>, tuning: &SocketTuning) -> SocketResult<TcpStream> {
        self.require_listening()?;
        if let Some(dur) = timeout {
            if !sys::wait_ready(self.handle.raw(), Interest::READABLE, Some(dur))? {
                return Err(SocketError::Timeout);
            }
        }
        self.accept_blocking(tuning)
    }

    /// Same as [`TcpListener::accept_with_timeout`] but returns `None`
    /// instead of raising `Timeout`.
    pub fn try_accept(&self, timeout: Option<Duration>, tuning: &SocketTuning) -> SocketResult<Option<TcpStream>> {
        match self.accept_with_timeout(timeout, tuning) {
            Ok(stream) => Ok(Some(stream)),
            Err(SocketError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Invokes the OS `accept` directly; semantics depend on the
    /// listener's current blocking mode (spec §4.3).
    pub fn accept_blocking(&self, tuning: &SocketTuning) -> SocketResult<TcpStream> {
        self.require_listening()?;
        let (sock, addr) = sys::accept(self.handle.raw())?;
        TcpStream::from_connected(sock, addr, tuning)
    }

    /// Single non-blocking attempt: `None` on `WouldBlock`/`EAGAIN`,
    /// raises on any other error.
    pub fn accept_nonblocking(&self, tuning: &SocketTuning) -> SocketResult<Option<TcpStream>> {
        self.require_listening()?;
        match sys::accept(self.handle.raw()) {
            Ok((sock, addr)) => Ok(Some(TcpStream::from_connected(sock, addr, tuning)?)),
            Err(SocketError::IoFailed { code, .. }) if is_would_block(code) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Spawns a single background worker performing one blocking `accept`
    /// and delivering the outcome via a one-shot channel (spec §4.3 "Async
    /// accept", §5 "the caller MUST ensure the listener outlives the
    /// background completion").
    ///
    /// # Safety
    /// `self` must outlive the returned receiver's completion; the worker
    /// thread dereferences the listener's raw descriptor for the duration
    /// of its blocking `accept` call.
    pub unsafe fn accept_async(&self, tuning: SocketTuning) -> mpsc::Receiver<SocketResult<TcpStream>> {
        let (tx, rx) = mpsc::channel();
        let sock = self.handle.raw();
        thread::spawn(move || {
            let outcome = sys::accept(sock).and_then(|(fd, addr)| TcpStream::from_connected(fd, addr, &tuning));
            let _ = tx.send(outcome);
        });
        rx
    }

    pub fn close(&mut self) -> SocketResult<()> {
        self.handle.close()?;
        self.state = ListenerState::Closed;
        Ok(())
    }

    pub fn options(&self) -> SocketOptions {
        SocketOptions::new(self.handle.raw(), true)
    }
}

#[cfg(unix)]
fn is_would_block(code: i32) -> bool {
    code == libc::EWOULDBLOCK || code == libc::EAGAIN
}

#[cfg(windows)]
fn is_would_block(code: i32) -> bool {
    const WSAEWOULDBLOCK: i32 = 10035;
    code == WSAEWOULDBLOCK
}
