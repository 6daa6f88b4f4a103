//! `DatagramPacket`: payload plus addressing for a single UDP datagram
//! (spec §4.5 "Send contract", "Receive contract"). Grounded on
//! `original_source/include/jsocketpp/DatagramPacket.hpp`.

use crate::address::Port;
use crate::error::{SocketError, SocketResult};

/// A UDP datagram's payload and addressing, shared by send and receive
/// paths. On send, `address`/`port` name the destination; on receive,
/// they're filled in with the sender's endpoint.
#[derive(Debug, Clone, Default)]
pub struct DatagramPacket {
    pub buffer: Vec<u8>,
    pub address: String,
    pub port: Port,
}

impl DatagramPacket {
    /// An empty packet with a pre-sized buffer, ready for a receive.
    pub fn new(size: usize) -> DatagramPacket {
        DatagramPacket { buffer: vec![0u8; size], address: String::new(), port: 0 }
    }

    pub fn with_destination(data: impl Into<Vec<u8>>, address: impl Into<String>, port: Port) -> DatagramPacket {
        DatagramPacket { buffer: data.into(), address: address.into(), port }
    }

    pub fn resize(&mut self, new_size: usize) {
        self.buffer.resize(new_size, 0);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.address.clear();
        self.port = 0;
    }

    /// Reports whether this packet specifies an explicit destination: a
    /// non-blank address and a non-zero port (spec §4.5 "`write(packet)`").
    ///
    /// The source treats an address consisting solely of whitespace as "no
    /// destination" (spec §9 Open Question 1); this reimplementation
    /// instead rejects a whitespace-only address outright, since a caller
    /// that set a non-empty address almost certainly intended it to be
    /// used and silently discarding it is more likely to hide a bug than
    /// to help one.
    pub fn has_destination(&self) -> SocketResult<bool> {
        if self.address.is_empty() {
            return Ok(false);
        }
        if self.address.trim().is_empty() {
            return Err(SocketError::InvalidArgument("destination address is whitespace-only".into()));
        }
        Ok(self.port != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_address_has_no_destination() {
        let p = DatagramPacket::new(16);
        assert!(!p.has_destination().unwrap());
    }

    #[test]
    fn whitespace_address_is_rejected() {
        let p = DatagramPacket::with_destination(b"x".to_vec(), "   ", 9000);
        assert!(p.has_destination().is_err());
    }

    #[test]
    fn zero_port_has_no_destination() {
        let p = DatagramPacket::with_destination(b"x".to_vec(), "127.0.0.1", 0);
        assert!(!p.has_destination().unwrap());
    }

    #[test]
    fn full_destination_reports_true() {
        let p = DatagramPacket::with_destination(b"x".to_vec(), "127.0.0.1", 9000);
        assert!(p.has_destination().unwrap());
    }
}
