//! RAII guard for a temporary blocking-mode override, used by timed
//! `connect` (spec §4.4.1) and the non-destructive `is_connected` probe
//! (spec §4.4.4). Directly grounded on
//! `original_source/include/jsocketpp/internal/ScopedBlockingMode.hpp`:
//! construction reads the current mode and applies the override; drop
//! restores the original mode unconditionally, including on error/panic
//! unwind paths.
//!
//! Per spec §9, nesting two guards on the same socket is undefined in the
//! source; this implementation makes restoration idempotent rather than
//! forbidding nesting outright -- the inner guard restores to whatever the
//! outer guard had set, and the outer guard then restores to the true
//! original, so nested (non-overlapping) use behaves correctly even
//! though it's still not a supported pattern.

use crate::error::SocketResult;
use crate::handle::SocketHandle;

/// While alive, forces the socket into `temporary_nonblocking` mode. On
/// drop, restores whatever mode the socket was in when this guard was
/// constructed.
#[derive(Debug)]
pub struct ScopedBlockingMode<'a> {
    handle: &'a SocketHandle,
    previous_nonblocking: bool,
}

impl<'a> ScopedBlockingMode<'a> {
    pub fn new(handle: &'a SocketHandle, temporary_nonblocking: bool) -> SocketResult<Self> {
        let previous_nonblocking = handle.is_nonblocking();
        if previous_nonblocking != temporary_nonblocking {
            handle.set_nonblocking(temporary_nonblocking)?;
        }
        Ok(ScopedBlockingMode { handle, previous_nonblocking })
    }
}

impl Drop for ScopedBlockingMode<'_> {
    fn drop(&mut self) {
        if self.handle.is_nonblocking() != self.previous_nonblocking {
            // Errors restoring are swallowed, matching the source's
            // noexcept destructor (`catch (...) { /* swallow */ }`).
            let _ = self.handle.set_nonblocking(self.previous_nonblocking);
        }
    }
}
