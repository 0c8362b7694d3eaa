//! Network transports
//!
//! This module hides the TCP and UDP flavours of the protocol behind the
//! [`Transport`] trait. The session picks one implementation at start-up and
//! never branches on the transport again.

mod reliability;
mod resolve;
mod tcp;
mod udp;

pub use self::reliability::{PeerAddress, Reliability};
pub use self::resolve::resolve;
pub use self::tcp::TcpTransport;
pub use self::udp::UdpTransport;

use crate::core::Result;
use crate::protocol::Message;

/// Message-level connection to the chat server
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends a message to the server
    ///
    /// Reliable transports return only once the server confirmed delivery.
    async fn send(&mut self, message: &Message) -> Result<()>;

    /// Waits for the next message from the server
    ///
    /// Must be cancel safe: the session races it against user input.
    async fn recv(&mut self) -> Result<Message>;

    /// Releases the connection
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}
