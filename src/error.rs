//! The error taxonomy used throughout `sockpp`.
//!
//! The teacher crate this library is grounded on returns plain
//! `std::io::Result` everywhere; that doesn't give callers enough to
//! distinguish a timeout from a peer-initiated close from a protocol
//! violation. `SocketError` names each of those cases explicitly while
//! still wrapping the underlying OS error when one exists.

use std::fmt;
use std::io;

/// Result alias used by every fallible operation in this crate.
pub type SocketResult<T> = Result<T, SocketError>;

/// Which half of name resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPhase {
    /// Host-name lookup failed.
    Host,
    /// Service/port lookup failed.
    Service,
}

impl fmt::Display for ResolutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionPhase::Host => f.write_str("host"),
            ResolutionPhase::Service => f.write_str("service"),
        }
    }
}

/// The complete error taxonomy (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// A caller-supplied argument was out of range or otherwise invalid:
    /// a null buffer with non-zero length, a port out of range, a TTL
    /// outside `0..=255`, an empty multicast group.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// DNS or numeric resolution failed.
    #[error("resolution failed ({phase}): {message} (code {code})")]
    ResolutionFailed {
        /// Resolver-specific (`EAI_*`) code.
        code: i32,
        /// Whether the host or the service lookup failed.
        phase: ResolutionPhase,
        /// Resolver-specific human-readable message.
        message: String,
    },

    /// A system call (`socket`, `bind`, `listen`, `connect`, `accept`,
    /// `send`, `recv`, `setsockopt`, `getsockopt`, `close`, `ioctl`,
    /// `poll`/`select`, ...) failed.
    #[error("I/O failed: {message} (code {code})")]
    IoFailed {
        /// errno (POSIX) or WSA error code (Windows).
        code: i32,
        /// Platform-rendered message for `code`.
        message: String,
    },

    /// A per-call timeout expired (`wait_ready`, timed connect, timed
    /// read/write).
    #[error("operation timed out")]
    Timeout,

    /// The peer performed an orderly close, observed as a zero-length
    /// `recv`.
    #[error("connection closed by peer")]
    Closed,

    /// The operation is not valid for the socket's current state (e.g.
    /// receiving on an unbound datagram socket, accepting on a
    /// non-listening listener).
    #[error("invalid socket state: {0}")]
    InvalidState(String),

    /// A second `bind` was attempted on an already-bound socket.
    #[error("socket is already bound")]
    AlreadyBound,

    /// `connect` was called on a socket that is already connected.
    #[error("socket is already connected")]
    AlreadyConnected,

    /// An operation that requires a connected peer was attempted on a
    /// socket with none.
    #[error("socket is not connected")]
    NotConnected,

    /// `read_until`/`read_line` reached `max_len` without observing the
    /// delimiter.
    #[error("maximum length {max_len} exceeded without delimiter")]
    MaxExceeded {
        /// The limit that was exceeded.
        max_len: usize,
    },

    /// A length-prefixed payload exceeds the caller's bound, or cannot
    /// fit inside the chosen prefix width.
    #[error("payload too large: {size} exceeds limit {limit}")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// The bound that was exceeded.
        limit: usize,
    },

    /// A UDP send transmitted fewer bytes than the datagram required.
    #[error("partial datagram: sent {sent} of {total} bytes")]
    PartialDatagram {
        /// Bytes actually transmitted.
        sent: usize,
        /// Bytes requested.
        total: usize,
    },

    /// A UDP payload exceeds the safe/family-specific maximum.
    #[error("message too big: {size} exceeds {limit}")]
    MessageTooBig {
        /// Requested payload size.
        size: usize,
        /// The limit that was exceeded.
        limit: usize,
    },

    /// Windows `select()` was asked to watch a descriptor numerically
    /// too large for `FD_SETSIZE`.
    #[error("descriptor too large for select()")]
    DescriptorTooLarge,

    /// An address family is unsupported in a context that requires a
    /// specific one.
    #[error("unsupported address family: {0}")]
    Unsupported(String),
}

impl From<io::Error> for SocketError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            return SocketError::Timeout;
        }
        SocketError::IoFailed {
            code: err.raw_os_error().unwrap_or(0),
            message: with_location(err.to_string()),
        }
    }
}

impl SocketError {
    /// Builds an [`SocketError::IoFailed`] from the current `errno`/`GetLastError`
    /// value, rendered through the platform's standard error table.
    #[track_caller]
    pub fn from_last_os_error() -> SocketError {
        io::Error::last_os_error().into()
    }

    /// Builds a [`SocketError::ResolutionFailed`] from a resolver-domain
    /// (`EAI_*`) code, rendered through the resolver-specific table. The
    /// errno/WSA and resolver namespaces must never be confused with one
    /// another; this constructor is the only place an `EAI_*` code is
    /// turned into text.
    #[track_caller]
    pub fn resolution_failed(code: i32, phase: ResolutionPhase) -> SocketError {
        SocketError::ResolutionFailed {
            code,
            phase,
            message: with_location(crate::sys::gai_strerror(code)),
        }
    }
}

/// Appends `[at file:line]` to `message` when the `error-location`
/// feature is enabled; otherwise a no-op. Grounded on
/// `original_source/include/jsocketpp/common.hpp`'s optional
/// source-location suffix for `SocketErrorMessage`.
#[track_caller]
pub(crate) fn with_location(message: String) -> String {
    if cfg!(feature = "error-location") {
        let loc = std::panic::Location::caller();
        format!("{message} [at {}:{}]", loc.file(), loc.line())
    } else {
        message
    }
}
