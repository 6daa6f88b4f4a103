#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(warnings))]

//! Cross-platform, synchronous, Java-inspired sockets: connection-oriented
//! TCP streams, connectionless UDP datagrams with a multicast
//! specialization, and local AF_UNIX IPC.
//!
//! # Goals
//!
//! * A small, explicit I/O core: blocking, timed, and non-blocking variants
//!   of connect/accept/read/write built directly on `socket`/`bind`/
//!   `listen`/`accept`/`connect`/`send`/`recv`, not on `std::net`.
//! * One error taxonomy ([`error::SocketError`]) across every socket kind,
//!   normalizing errno/WSA/`EAI_*` differences.
//! * Byte-for-byte control over framing: length-prefixed messages,
//!   delimiter-terminated reads, and scatter/gather I/O with retry.
//!
//! # Platforms
//!
//! * Linux, macOS, and other POSIX systems via `libc`.
//! * Windows via `winapi`/`ws2_32-sys`, including native `AF_UNIX` support
//!   (Windows 10 version 1803 and later).
//!
//! # Usage
//!
//! ```no_run
//! use sockpp::tcp::{TcpListener, TcpStream};
//! use sockpp::options::SocketTuning;
//! use std::time::Duration;
//!
//! let listener = TcpListener::new(0, None, true, true, None, false).unwrap();
//! let port = listener.local_addr().port().unwrap();
//!
//! let mut client = TcpStream::connect_timeout("127.0.0.1", port, Some(Duration::from_secs(1)), &SocketTuning::default()).unwrap();
//! client.write_all(&b"hello"[..]).unwrap();
//!
//! let mut server_side = listener.accept(&SocketTuning::default()).unwrap();
//! let received = server_side.read_exact(5).unwrap();
//! assert_eq!(&received, b"hello");
//! ```

pub mod address;
pub mod blocking;
pub mod buf;
pub mod endian;
pub mod error;
pub mod handle;
pub mod options;
pub mod resolve;
mod sys;
pub mod tcp;
pub mod udp;
pub mod uds;

pub use address::{Address, Port};
pub use error::{ResolutionPhase, SocketError, SocketResult};
pub use handle::SocketHandle;
