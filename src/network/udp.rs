use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::core::{Error, Result, MAX_DATAGRAM_SIZE};
use crate::protocol::binary::{self, Frame};
use crate::protocol::Message;
use super::reliability::{PeerAddress, Reliability};
use super::Transport;

/// UDP transport with confirmations, retransmissions and duplicate suppression
pub struct UdpTransport {
    /// Ephemeral local socket
    socket: UdpSocket,
    /// Where outgoing datagrams go
    peer: PeerAddress,
    /// Identifier and retry bookkeeping
    reliability: Reliability,
    /// Decoded inbound messages not yet handed to the session
    inbox: VecDeque<Result<Message>>,
    /// Buffer for receiving data
    recv_buffer: Vec<u8>,
    /// Identifier of the AUTH or JOIN awaiting its REPLY
    pending_request: Option<u16>,
    /// Set once the server said BYE
    peer_said_bye: bool,
}

impl UdpTransport {
    /// Binds an ephemeral IPv4 socket for talking to `server`
    pub async fn bind(server: SocketAddr, timeout: Duration, max_retries: u8) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0)))
            .await
            .map_err(|e| Error::connect(format!("Failed to bind UDP socket: {}", e)))?;
        debug!(local = ?socket.local_addr().ok(), %server, "UDP socket bound");

        Ok(UdpTransport {
            socket,
            peer: PeerAddress::new(server),
            reliability: Reliability::new(timeout, max_retries),
            inbox: VecDeque::new(),
            recv_buffer: vec![0; MAX_DATAGRAM_SIZE],
            pending_request: None,
            peer_said_bye: false,
        })
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::connect(format!("Failed to get local address: {}", e)))
    }

    /// Returns the address the next datagram will be sent to
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer.target()
    }

    /// Sends raw bytes to `target`
    pub async fn send_to(&self, datagram: &[u8], target: SocketAddr) -> Result<()> {
        self.socket.send_to(datagram, target).await?;
        Ok(())
    }

    /// Receives one datagram, latching the server's dynamic address on the first one
    pub async fn receive(&mut self) -> Result<(Vec<u8>, SocketAddr)> {
        let (size, source) = self.socket.recv_from(&mut self.recv_buffer).await?;
        if self.peer.latch(source) {
            debug!(%source, "server address latched");
        } else if source != self.peer.target() {
            debug!(%source, "datagram from unexpected source");
        }
        Ok((self.recv_buffer[..size].to_vec(), source))
    }

    /// Sends `datagram` until the CONFIRM for `msg_id` arrives
    ///
    /// The identical bytes are retransmitted after every timeout, at most
    /// `max_retries` times. Anything else received meanwhile goes through the
    /// normal inbound path.
    pub async fn send_with_confirmation(&mut self, datagram: &[u8], msg_id: u16) -> Result<()> {
        let max_retries = self.reliability.max_retries();

        for attempt in 0..=max_retries {
            if attempt > 0 {
                debug!(msg_id, attempt, "no confirmation, retransmitting");
            }
            self.send_to(datagram, self.peer.target()).await?;

            let deadline = Instant::now() + self.reliability.timeout();
            while let Ok(received) = timeout_at(deadline, self.receive()).await {
                let (inbound, _) = received?;
                if self.process(&inbound).await? == Some(msg_id) {
                    trace!(msg_id, "confirmed");
                    return Ok(());
                }
            }
        }

        Err(Error::timeout(format!(
            "message {} not confirmed after {} retransmissions",
            msg_id, max_retries
        )))
    }

    async fn confirm(&self, msg_id: u16) -> Result<()> {
        trace!(msg_id, "sending confirmation");
        self.send_to(&Frame::confirm(msg_id).encode(), self.peer.target())
            .await
    }

    /// Handles one inbound datagram
    ///
    /// Returns the acknowledged identifier if the datagram is a CONFIRM.
    /// Everything else is confirmed and, unless it is a duplicate or a PING,
    /// queued for [`Transport::recv`]. Queueing happens before the CONFIRM is
    /// sent so a cancelled caller never loses a message.
    async fn process(&mut self, datagram: &[u8]) -> Result<Option<u16>> {
        let frame = match Frame::decode(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "malformed datagram");
                match binary::peek_header(datagram) {
                    Some((tag, msg_id)) if tag != binary::tag::CONFIRM => {
                        if self.reliability.mark_processed(msg_id) {
                            self.inbox.push_back(Err(e));
                        }
                        self.confirm(msg_id).await?;
                    }
                    _ => self.inbox.push_back(Err(e)),
                }
                return Ok(None);
            }
        };

        if let Message::Confirm { ref_id } = frame.message {
            return Ok(Some(ref_id));
        }

        let msg_id = frame.msg_id;
        if !self.reliability.mark_processed(msg_id) {
            debug!(msg_id, kind = frame.message.kind(), "duplicate datagram");
            self.confirm(msg_id).await?;
            return Ok(None);
        }

        match frame.message {
            Message::Ping => trace!(msg_id, "ping"),
            reply @ (Message::ReplyOk { .. } | Message::ReplyNok { .. }) => {
                match (self.pending_request, frame.ref_msg_id) {
                    (Some(expected), Some(actual)) if expected != actual => {
                        self.inbox.push_back(Err(Error::protocol_violation(format!(
                            "REPLY references message {}, expected {}",
                            actual, expected
                        ))));
                    }
                    _ => {
                        self.pending_request = None;
                        self.inbox.push_back(Ok(reply));
                    }
                }
            }
            bye @ Message::Bye { .. } => {
                self.peer_said_bye = true;
                self.inbox.push_back(Ok(bye));
            }
            other => self.inbox.push_back(Ok(other)),
        }

        self.confirm(msg_id).await?;
        Ok(None)
    }

    /// Keeps confirming retransmissions for the retry budget
    async fn linger(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.reliability.linger();
        while let Ok(received) = timeout_at(deadline, self.receive()).await {
            let (inbound, _) = received?;
            self.process(&inbound).await?;
        }
        self.inbox.clear();
        Ok(())
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, message: &Message) -> Result<()> {
        let msg_id = self.reliability.next_msg_id();
        if message.expects_reply() {
            self.pending_request = Some(msg_id);
        }
        trace!(msg_id, kind = message.kind(), "sending datagram");
        let datagram = Frame::new(msg_id, message.clone()).encode();
        self.send_with_confirmation(&datagram, msg_id).await
    }

    async fn recv(&mut self) -> Result<Message> {
        loop {
            if let Some(next) = self.inbox.pop_front() {
                return next;
            }
            let (inbound, _) = self.receive().await?;
            if let Some(ref_id) = self.process(&inbound).await? {
                trace!(ref_id, "stray confirmation");
            }
        }
    }

    async fn close(mut self) -> Result<()> {
        if self.peer_said_bye {
            self.linger().await?;
        }
        debug!("UDP socket closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn setup(timeout_ms: u64, retries: u8) -> (UdpTransport, UdpSocket, SocketAddr) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::bind(
            server.local_addr().unwrap(),
            Duration::from_millis(timeout_ms),
            retries,
        )
        .await
        .unwrap();
        let client = SocketAddr::from(([127, 0, 0, 1], transport.local_addr().unwrap().port()));
        (transport, server, client)
    }

    async fn drain(socket: &UdpSocket) -> Vec<Frame> {
        let mut buf = [0u8; 1024];
        let mut frames = Vec::new();
        while let Ok(Ok((n, _))) = timeout(Duration::from_millis(100), socket.recv_from(&mut buf)).await {
            frames.push(Frame::decode(&buf[..n]).unwrap());
        }
        frames
    }

    fn auth() -> Message {
        Message::Auth {
            username: "u".into(),
            display_name: "d".into(),
            secret: "s".into(),
        }
    }

    #[tokio::test]
    async fn test_timeout_after_retries() {
        let (mut transport, server, _) = setup(30, 3).await;

        let err = transport.send(&auth()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        let frames = drain(&server).await;
        assert_eq!(frames.len(), 4);
        for frame in &frames {
            assert_eq!(frame, &Frame::new(0, auth()));
        }
    }

    #[tokio::test]
    async fn test_confirm_and_reply_from_dynamic_port() {
        let (mut transport, server, _) = setup(500, 3).await;
        let dynamic = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dynamic_addr = dynamic.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (n, client) = server.recv_from(&mut buf).await.unwrap();
            let request = Frame::decode(&buf[..n]).unwrap();

            dynamic.send_to(&Frame::confirm(request.msg_id).encode(), client).await.unwrap();
            let reply = Frame::reply(100, request.msg_id, Message::ReplyOk { content: "hi".into() });
            dynamic.send_to(&reply.encode(), client).await.unwrap();

            let (n, _) = dynamic.recv_from(&mut buf).await.unwrap();
            let confirm = Frame::decode(&buf[..n]).unwrap();

            let (n, _) = dynamic.recv_from(&mut buf).await.unwrap();
            let bye = Frame::decode(&buf[..n]).unwrap();
            dynamic.send_to(&Frame::confirm(bye.msg_id).encode(), client).await.unwrap();
            (request, confirm, bye)
        });

        transport.send(&auth()).await.unwrap();
        assert_eq!(transport.peer_addr(), dynamic_addr);
        assert_eq!(
            transport.recv().await.unwrap(),
            Message::ReplyOk { content: "hi".into() }
        );
        let bye = Message::Bye { display_name: Some("d".into()) };
        transport.send(&bye).await.unwrap();

        let (request, confirm, bye_frame) = server_task.await.unwrap();
        assert_eq!(request.msg_id, 0);
        assert_eq!(confirm, Frame::confirm(100));
        assert_eq!(bye_frame, Frame::new(1, bye));
    }

    #[tokio::test]
    async fn test_duplicates_are_confirmed_but_delivered_once() {
        let (mut transport, server, client) = setup(100, 3).await;
        let msg = |id: u16, content: &str| {
            Frame::new(id, Message::Msg { display_name: "Bob".into(), content: content.into() })
        };

        server.send_to(&msg(7, "first").encode(), client).await.unwrap();
        server.send_to(&msg(7, "first").encode(), client).await.unwrap();
        server.send_to(&msg(8, "second").encode(), client).await.unwrap();

        assert_eq!(transport.recv().await.unwrap(), msg(7, "first").message);
        assert_eq!(transport.recv().await.unwrap(), msg(8, "second").message);

        let confirms = drain(&server).await;
        assert_eq!(
            confirms,
            vec![Frame::confirm(7), Frame::confirm(7), Frame::confirm(8)]
        );
    }

    #[tokio::test]
    async fn test_ping_is_confirmed_silently() {
        let (mut transport, server, client) = setup(100, 3).await;
        server.send_to(&Frame::new(3, Message::Ping).encode(), client).await.unwrap();
        let chat = Frame::new(4, Message::Msg { display_name: "a".into(), content: "b".into() });
        server.send_to(&chat.encode(), client).await.unwrap();

        assert_eq!(transport.recv().await.unwrap(), chat.message);
        assert_eq!(drain(&server).await, vec![Frame::confirm(3), Frame::confirm(4)]);
    }

    #[tokio::test]
    async fn test_malformed_datagram_is_confirmed_and_reported() {
        let (mut transport, server, client) = setup(100, 3).await;
        server.send_to(&[0x42, 0x00, 0x05, b'?'], client).await.unwrap();

        let err = transport.recv().await.unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
        assert_eq!(drain(&server).await, vec![Frame::confirm(5)]);
    }

    #[tokio::test]
    async fn test_reply_for_other_request_is_rejected() {
        let (mut transport, server, client) = setup(200, 1).await;

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (n, _) = server.recv_from(&mut buf).await.unwrap();
            let request = Frame::decode(&buf[..n]).unwrap();
            server.send_to(&Frame::confirm(request.msg_id).encode(), client).await.unwrap();
            let reply = Frame::reply(1, request.msg_id + 10, Message::ReplyOk { content: "?".into() });
            server.send_to(&reply.encode(), client).await.unwrap();
        });

        transport.send(&auth()).await.unwrap();
        server_task.await.unwrap();
        assert!(matches!(transport.recv().await, Err(Error::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_close_confirms_retransmitted_bye() {
        let (mut transport, server, client) = setup(20, 3).await;
        let bye = Frame::new(9, Message::Bye { display_name: Some("Server".into()) });

        server.send_to(&bye.encode(), client).await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), bye.message);

        server.send_to(&bye.encode(), client).await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(drain(&server).await, vec![Frame::confirm(9), Frame::confirm(9)]);
    }
}
