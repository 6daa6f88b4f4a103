//! spec §8 end-to-end scenario 3: delimiter-terminated reads over a single
//! flushed write.

use std::thread;

use sockpp::options::SocketTuning;
use sockpp::tcp::{TcpListener, TcpStream};

#[test]
fn line_by_line_delivery() {
    let _ = env_logger::try_init();

    let listener = TcpListener::new(0, None, true, true, None, false).unwrap();
    let port = listener.local_addr().port().unwrap();

    let server = thread::spawn(move || {
        let mut conn = listener.accept(&SocketTuning::default()).unwrap();
        conn.write_all(&b"first\nsecond\nthird\n"[..]).unwrap();
    });

    let mut client = TcpStream::connect("127.0.0.1", port).unwrap();
    assert_eq!(client.read_line(64, false).unwrap(), "first");
    assert_eq!(client.read_line(64, false).unwrap(), "second");
    assert_eq!(client.read_line(64, false).unwrap(), "third");

    server.join().unwrap();
}
