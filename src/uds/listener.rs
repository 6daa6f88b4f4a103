//! Unix-Domain stream server (spec §4.7). Mirrors [`crate::tcp::TcpListener`]
//! with a filesystem address in place of a resolved network endpoint,
//! grounded on `original_source/include/jsocketpp/UnixSocket.hpp`'s
//! `bind`/`listen`/`accept`/`isPathInUse`.

use std::path::{Path, PathBuf};

use crate::error::{SocketError, SocketResult};
use crate::handle::SocketHandle;
use crate::options::SocketTuning;
use crate::sys::{self, RawSocket};
use crate::uds::stream::UnixStream;

const DEFAULT_BACKLOG: i32 = 128;

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

/// A listener bound to a filesystem path (spec §4.7).
#[derive(Debug)]
pub struct UnixListener {
    handle: SocketHandle,
    path: PathBuf,
    listening: bool,
}

impl UnixListener {
    /// Unlinks any existing entry at `path` (spec §4.7 "before bind, any
    /// existing path at the location MUST be removed"), then binds and
    /// starts listening.
    pub fn bind(path: impl AsRef<Path>, backlog: i32) -> SocketResult<UnixListener> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);

        let sock = sys::socket(af_unix(), sock_stream(), 0)?;
        let handle = SocketHandle::from_raw(sock);
        if let Err(e) = sys::unix_bind(handle.raw(), &path) {
            return Err(e);
        }
        let backlog = if backlog <= 0 { DEFAULT_BACKLOG } else { backlog };
        sys::listen(handle.raw(), backlog)?;
        Ok(UnixListener { handle, path, listening: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    fn raw(&self) -> SocketResult<RawSocket> {
        if self.handle.is_closed() {
            return Err(SocketError::InvalidState("listener is closed".into()));
        }
        Ok(self.handle.raw())
    }

    /// Accepts one connection, producing a peer [`UnixStream`] (spec §4.7).
    pub fn accept(&self, tuning: &SocketTuning) -> SocketResult<UnixStream> {
        if !self.listening {
            return Err(SocketError::InvalidState("listener is not listening".into()));
        }
        let (sock, addr) = sys::accept(self.raw()?)?;
        UnixStream::from_connected(sock, addr, tuning)
    }

    /// Closes the listener and unlinks the bound path (spec §4.7 "on
    /// destruction the owning side unlinks the path").
    pub fn close(&mut self) -> SocketResult<()> {
        self.handle.close()?;
        self.listening = false;
        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }

    /// Probes whether a process is listening at `path` by attempting a
    /// connect and classifying the result: `ECONNREFUSED`/`ENOENT` means
    /// not in use, success means in use, any other error propagates
    /// (spec §4.7 "`is_path_in_use`").
    pub fn is_path_in_use(path: impl AsRef<Path>) -> SocketResult<bool> {
        let sock = sys::socket(af_unix(), sock_stream(), 0)?;
        let result = sys::unix_connect(sock, path.as_ref());
        let _ = sys::close(sock);
        match result {
            Ok(()) => Ok(true),
            Err(err) => match err.raw_os_error() {
                #[cfg(unix)]
                Some(code) if code == libc::ECONNREFUSED || code == libc::ENOENT => Ok(false),
                #[cfg(windows)]
                Some(code) if code == 10061 || code == 2 => Ok(false), // WSAECONNREFUSED, ENOENT
                _ => Err(SocketError::from(err)),
            },
        }
    }
}

impl Drop for UnixListener {
    fn drop(&mut self) {
        if !self.handle.is_closed() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::uds::stream::UnixStream;

    fn temp_path(dir: &tempdir::TempDir, name: &str) -> PathBuf {
        dir.path().join(format!("{name}.sock"))
    }

    #[test]
    fn bind_removes_stale_path_and_listens() {
        let dir = tempdir::TempDir::new("sockpp-uds").unwrap();
        let path = temp_path(&dir, "stale");
        std::fs::write(&path, b"leftover").unwrap();
        let listener = UnixListener::bind(&path, 0).unwrap();
        assert!(listener.is_listening());
        drop(listener);
        assert!(!path.exists());
    }

    #[test]
    fn path_in_use_reflects_listener_lifetime() {
        let dir = tempdir::TempDir::new("sockpp-uds").unwrap();
        let path = temp_path(&dir, "in-use");
        assert!(!UnixListener::is_path_in_use(&path).unwrap());
        let listener = UnixListener::bind(&path, 0).unwrap();
        assert!(UnixListener::is_path_in_use(&path).unwrap());
        drop(listener);
        assert!(!UnixListener::is_path_in_use(&path).unwrap());
    }

    #[test]
    fn accept_delivers_a_connected_peer() {
        let dir = tempdir::TempDir::new("sockpp-uds").unwrap();
        let path = temp_path(&dir, "accept");
        let listener = UnixListener::bind(&path, 0).unwrap();
        let _client = UnixStream::connect(&path).unwrap();
        let server_side = listener.accept(&SocketTuning::default()).unwrap();
        assert!(server_side.is_connected());
    }
}
