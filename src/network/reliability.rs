//! Bookkeeping for acknowledged delivery over UDP
//!
//! [`Reliability`] allocates message identifiers and remembers which inbound
//! identifiers were already handled. [`PeerAddress`] tracks where the server
//! actually answers from. Neither touches the socket; the UDP transport owns
//! the send/receive loop.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Identifier allocation, retry budget and duplicate detection
#[derive(Debug)]
pub struct Reliability {
    /// Identifier of the next outgoing message
    next_id: u16,
    /// Inbound identifiers that were already confirmed
    processed: HashSet<u16>,
    /// Time to wait for a CONFIRM before retransmitting
    timeout: Duration,
    /// Retransmissions after the first send
    max_retries: u8,
}

impl Reliability {
    /// Creates bookkeeping for a new session
    pub fn new(timeout: Duration, max_retries: u8) -> Self {
        Reliability {
            next_id: 0,
            processed: HashSet::new(),
            timeout,
            max_retries,
        }
    }

    /// Allocates the identifier for a new outgoing message
    pub fn next_msg_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Records an inbound identifier; returns false if it was seen before
    pub fn mark_processed(&mut self, msg_id: u16) -> bool {
        self.processed.insert(msg_id)
    }

    /// Confirmation timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retransmission budget
    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// How long to keep confirming retransmissions after the server's BYE
    pub fn linger(&self) -> Duration {
        self.timeout * (u32::from(self.max_retries) + 1)
    }
}

/// The server address outgoing datagrams are sent to
///
/// Starts as the resolved well-known address and switches, once, to the
/// source of the first datagram received from the server.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddress {
    server: SocketAddr,
    latched: Option<SocketAddr>,
}

impl PeerAddress {
    /// Creates a peer address pointing at the well-known server address
    pub fn new(server: SocketAddr) -> Self {
        PeerAddress {
            server,
            latched: None,
        }
    }

    /// Latches `source` if no address was latched yet; returns true if it did
    pub fn latch(&mut self, source: SocketAddr) -> bool {
        if self.latched.is_some() {
            return false;
        }
        self.latched = Some(source);
        true
    }

    /// Address for the next outgoing datagram
    pub fn target(&self) -> SocketAddr {
        self.latched.unwrap_or(self.server)
    }
}
