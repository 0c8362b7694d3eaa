use std::io;
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::core::{Error, Result};
use crate::protocol::{text, LineCodec, Message};
use super::Transport;

/// TCP transport speaking the text grammar
///
/// Generic over the stream so tests can substitute a scripted mock.
pub struct TcpTransport<S = TcpStream> {
    framed: Framed<S, LineCodec>,
}

impl TcpTransport<TcpStream> {
    /// Connects to the server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::connect(format!("Failed to connect to {}: {}", addr, e)))?;
        debug!(%addr, "TCP connected");
        Ok(TcpTransport::new(stream))
    }
}

impl<S> TcpTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream
    pub fn new(stream: S) -> Self {
        TcpTransport {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    /// Writes one line, appending CR LF
    pub async fn send_line(&mut self, line: String) -> Result<()> {
        trace!(%line, "sending line");
        self.framed.send(line).await
    }

    /// Waits for the next complete line
    ///
    /// Cancel safe: partial data stays in the receive buffer.
    pub async fn receive_line(&mut self) -> Result<String> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                trace!(%line, "received line");
                Ok(line)
            }
            Some(Err(Error::Io(e))) if is_disconnect(&e) => Err(Error::ConnectionClosed),
            Some(Err(e)) => Err(e),
            None => Err(Error::ConnectionClosed),
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}

impl<S> Transport for TcpTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, message: &Message) -> Result<()> {
        let line = text::encode(message)?;
        self.send_line(line).await
    }

    async fn recv(&mut self) -> Result<Message> {
        let line = self.receive_line().await?;
        text::decode(&line)
    }

    async fn close(mut self) -> Result<()> {
        SinkExt::<String>::close(&mut self.framed).await?;
        debug!("TCP connection closed");
        Ok(())
    }
}
