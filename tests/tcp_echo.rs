//! spec §8 end-to-end scenario 1: a loopback echo round trip.

use std::thread;

use sockpp::options::SocketTuning;
use sockpp::tcp::{TcpListener, TcpStream};

#[test]
fn echo_round_trip() {
    let _ = env_logger::try_init();

    let listener = TcpListener::new(0, None, true, true, None, false).unwrap();
    let port = listener.local_addr().port().unwrap();

    let server = thread::spawn(move || {
        let mut conn = listener.accept(&SocketTuning::default()).unwrap();
        let ping = conn.read_string().unwrap();
        assert_eq!(ping, "ping");
        conn.write_all(ping.as_bytes()).unwrap();
        conn.close().unwrap();
    });

    let mut client = TcpStream::connect("127.0.0.1", port).unwrap();
    client.write_all(&b"ping"[..]).unwrap();
    let reply = client.read_exact(4).unwrap();
    assert_eq!(&reply, b"ping");
    client.close().unwrap();

    server.join().unwrap();
}
