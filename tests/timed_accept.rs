//! spec §8 end-to-end scenario 4: a configured accept timeout.

use std::thread;
use std::time::Duration;

use sockpp::options::SocketTuning;
use sockpp::tcp::{TcpListener, TcpStream};

#[test]
fn accept_times_out_with_no_client() {
    let _ = env_logger::try_init();

    let listener = TcpListener::new(0, None, true, true, Some(Duration::from_millis(100)), false).unwrap();

    assert!(matches!(listener.accept(&SocketTuning::default()), Err(sockpp::SocketError::Timeout)));
    assert!(listener.try_accept(Some(Duration::from_millis(100)), &SocketTuning::default()).unwrap().is_none());
}

#[test]
fn accept_succeeds_once_a_client_connects() {
    let _ = env_logger::try_init();

    let listener = TcpListener::new(0, None, true, true, Some(Duration::from_millis(500)), false).unwrap();
    let port = listener.local_addr().port().unwrap();

    let client = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        TcpStream::connect("127.0.0.1", port).unwrap()
    });

    let server_side = listener.accept(&SocketTuning::default()).unwrap();
    assert!(server_side.is_connected());
    let _client = client.join().unwrap();
}
