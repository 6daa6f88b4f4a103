//! Platform abstraction (spec §4.1, component C1).
//!
//! Everything above this module works with a single descriptor type and a
//! single set of error/readiness primitives; the `unix`/`windows`
//! submodules are where the divergence lives. Mirrors the teacher's
//! `sys::{unix,windows}` split (`examples/damonbarry-mio/src/sys/mod.rs`),
//! generalized from two `Evented` socket types to the full syscall surface
//! this crate's components need: raw socket creation, close, blocking mode,
//! `FIONREAD`, readiness waiting, and name resolution.

#[cfg(unix)]
pub use self::unix::*;
#[cfg(unix)]
mod unix;

#[cfg(windows)]
pub use self::windows::*;
#[cfg(windows)]
mod windows;

use std::time::Duration;

/// Direction(s) a caller is waiting for readiness on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub const READABLE: Interest = Interest { readable: true, writable: false };
    pub const WRITABLE: Interest = Interest { readable: false, writable: true };
}

/// Renders a resolver-domain (`EAI_*`) code through the platform's
/// resolver-specific table. Kept distinct from rendering an errno/WSA
/// code -- the two namespaces must never be confused (spec §4.1).
pub fn gai_strerror(code: i32) -> String {
    imp::gai_strerror(code)
}

#[cfg(unix)]
use self::unix as imp;
#[cfg(windows)]
use self::windows as imp;

/// `poll`/`select`-based readiness wait with `EINTR`/remaining-time retry
/// (spec §4.3 "Readiness wait", §5 "Suspension points"). `timeout = None`
/// blocks indefinitely; `Some(Duration::ZERO)` polls once without blocking.
/// Returns `Ok(true)` if the socket became ready, `Ok(false)` on timeout.
pub fn wait_ready(
    sock: RawSocket,
    interest: Interest,
    timeout: Option<Duration>,
) -> crate::error::SocketResult<bool> {
    imp::wait_ready(sock, interest, timeout)
}
