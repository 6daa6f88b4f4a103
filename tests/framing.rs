//! spec §8 end-to-end scenario 2: length-prefixed messages, u32 and u8
//! prefixes, over a loopback TCP connection.

use std::thread;

use sockpp::options::SocketTuning;
use sockpp::tcp::{TcpListener, TcpStream};

#[test]
fn length_prefixed_round_trip() {
    let _ = env_logger::try_init();

    let listener = TcpListener::new(0, None, true, true, None, false).unwrap();
    let port = listener.local_addr().port().unwrap();

    let server = thread::spawn(move || {
        let mut conn = listener.accept(&SocketTuning::default()).unwrap();
        let msg = conn.read_prefixed::<u32>().unwrap();
        assert_eq!(&msg, b"hello world");

        let small = conn.read_prefixed_bounded::<u8>(16).unwrap();
        assert_eq!(small.len(), 12);
    });

    let mut client = TcpStream::connect("127.0.0.1", port).unwrap();
    client.write_prefixed::<u32>(b"hello world").unwrap();
    client.write_prefixed::<u8>(&[7u8; 12]).unwrap();

    server.join().unwrap();
}
