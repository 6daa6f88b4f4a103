//! UDP: the Datagram Packet (C5 payload), Datagram Socket (C5), and
//! Multicast Socket (C6) components (spec §4.5, §4.6).

mod multicast;
mod packet;
mod socket;

pub use multicast::MulticastSocket;
pub use packet::DatagramPacket;
pub use socket::{DatagramSocket, DatagramState, DEFAULT_DATAGRAM_BUFFER, IPV4_MAX, IPV6_MAX, SAFE_MAX};
