//! IPK25-CHAT client
//!
//! This library implements a client for the IPK25-CHAT protocol. The same
//! session state machine runs over TCP, using a CR LF delimited text grammar,
//! or over UDP, using binary frames with confirmations, retransmissions,
//! duplicate suppression and a server address that may move to a dynamic
//! port after the first reply.
pub mod core;

pub mod network;
pub mod protocol;
pub mod session;
pub mod util;

// Re-export commonly used items
pub use core::{Config, Error, Result, TransportKind};
pub use network::{TcpTransport, Transport, UdpTransport};
pub use session::{Session, Termination};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
