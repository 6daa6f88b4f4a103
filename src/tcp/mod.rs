//! TCP: the Stream Server (C3) and Stream Connection (C4) components
//! (spec §4.3, §4.4). Grounded on the teacher's `listener.rs`/`stream.rs`
//! pair, generalized from non-blocking `mio::Evented` sockets to the
//! synchronous, blocking/timed model spec §5 requires.

mod listener;
mod stream;

pub use listener::{ListenerState, TcpListener};
pub use stream::{ConnectionState, Prefix, ShutdownMode, TcpStream};
