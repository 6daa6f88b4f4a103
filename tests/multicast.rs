//! spec §8 end-to-end scenario 6: joining a multicast group, receiving a
//! datagram, then leaving and observing silence.

use std::thread;
use std::time::Duration;

use sockpp::udp::{DatagramPacket, DatagramSocket, MulticastSocket};

const GROUP: &str = "239.255.0.1";

#[test]
fn join_receive_then_leave() {
    let _ = env_logger::try_init();

    let mut receiver = MulticastSocket::new(0).unwrap();
    let receiver_port = receiver.local_addr().unwrap().port().unwrap();
    receiver.set_time_to_live(1).unwrap();
    receiver.set_loopback_mode(true).unwrap();
    receiver.join_group(GROUP, "").unwrap();
    assert_eq!(receiver.current_group(), Some(GROUP));

    let mut sender = DatagramSocket::new(64).unwrap();
    let packet = DatagramPacket::with_destination(b"hi".to_vec(), GROUP, receiver_port);
    sender.write(&packet).unwrap();

    let mut incoming = DatagramPacket::new(64);
    receiver.read(&mut incoming, true).unwrap();
    assert_eq!(incoming.buffer, b"hi");

    receiver.leave_group(GROUP, "").unwrap();
    assert_eq!(receiver.current_group(), None);

    sender.write(&packet).unwrap();
    receiver.options().set_recv_timeout(Some(Duration::from_millis(100))).unwrap();
    let mut after_leave = DatagramPacket::new(64);
    let result = receiver.read(&mut after_leave, true);
    assert!(result.is_err());

    thread::sleep(Duration::from_millis(10));
}
