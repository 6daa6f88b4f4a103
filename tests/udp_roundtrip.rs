//! spec §8 end-to-end scenario 5: a UDP datagram with sender-address
//! capture on receive.

use sockpp::udp::{DatagramPacket, DatagramSocket};

#[test]
fn round_trip_captures_sender() {
    let _ = env_logger::try_init();

    let mut server = DatagramSocket::new(2048).unwrap();
    server.bind_port(0).unwrap();
    let server_port = server.local_addr().unwrap().port().unwrap();

    let mut client = DatagramSocket::new(2048).unwrap();
    let out = DatagramPacket::with_destination(b"u".to_vec(), "127.0.0.1", server_port);
    client.write(&out).unwrap();

    let mut incoming = DatagramPacket::new(64);
    server.read(&mut incoming, true).unwrap();

    assert_eq!(incoming.buffer, b"u");
    assert_eq!(incoming.address, "127.0.0.1");
    assert!(incoming.port != 0);
}
