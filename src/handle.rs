//! [`SocketHandle`]: the single owning, move-only wrapper around a native
//! descriptor (spec §3 "SocketHandle", §9 "Ownership of handles").
//!
//! Grounded on the teacher's move-only-by-construction style (every
//! `UnixStream`/`UnixListener` in `examples/damonbarry-mio` owns exactly
//! one `sys::*` value and is never `Clone`, only `try_clone`-able via a
//! fresh `dup`).

use std::cell::Cell;
use std::fmt;

use crate::error::SocketResult;
use crate::sys::{self, RawSocket, INVALID_SOCKET};

/// An owned, exclusive native socket descriptor.
///
/// Moving transfers ownership; there is no `Clone`. The descriptor is
/// closed best-effort on drop. Explicit [`SocketHandle::close`] propagates
/// errors instead.
pub struct SocketHandle {
    raw: RawSocket,
    /// Tracked independently of the OS because Windows offers no way to
    /// *query* the current blocking mode (only to set it); POSIX could
    /// query it via `fcntl`, but one code path is kept for both platforms.
    nonblocking: Cell<bool>,
}

impl SocketHandle {
    /// Wraps an already-created descriptor. The descriptor is assumed to
    /// start in blocking mode, the default for newly created sockets on
    /// every supported platform.
    pub fn from_raw(raw: RawSocket) -> SocketHandle {
        SocketHandle { raw, nonblocking: Cell::new(false) }
    }

    /// The sentinel "invalid" handle (spec §3 invariant: "the handle
    /// sentinel is the single source of truth for usable").
    pub fn invalid() -> SocketHandle {
        SocketHandle { raw: INVALID_SOCKET, nonblocking: Cell::new(false) }
    }

    pub fn raw(&self) -> RawSocket {
        self.raw
    }

    pub fn is_closed(&self) -> bool {
        self.raw == INVALID_SOCKET
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.get()
    }

    /// Sets blocking mode and updates the cached flag in the same step,
    /// so later reads of [`SocketHandle::is_nonblocking`] stay accurate.
    pub fn set_nonblocking(&self, nonblocking: bool) -> SocketResult<()> {
        if self.is_closed() {
            return Err(crate::error::SocketError::InvalidState("handle is closed".into()));
        }
        sys::set_nonblocking(self.raw, nonblocking)?;
        self.nonblocking.set(nonblocking);
        Ok(())
    }

    /// Releases the descriptor, propagating any error from the underlying
    /// close call (spec §4.1, `close_or_throw`). Idempotent: closing an
    /// already-closed handle is a no-op success.
    pub fn close(&mut self) -> SocketResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        let raw = self.raw;
        self.raw = INVALID_SOCKET;
        sys::close(raw)
    }

    /// Takes the descriptor out, leaving `self` in the closed state. Used
    /// by accept paths that hand the new descriptor off to a freshly
    /// constructed connection object.
    pub fn take(&mut self) -> RawSocket {
        std::mem::replace(&mut self.raw, INVALID_SOCKET)
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if !self.is_closed() {
            sys::try_close_noexcept(self.raw);
        }
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle").field("raw", &self.raw).finish()
    }
}
