//! Event loop for a chat session
//!
//! A [`Session`] owns the transport and the protocol state machine and
//! multiplexes three event sources on one task: lines of user input, server
//! messages and a cancellation token raised by the signal handler. Every way
//! out of the loop goes through the same shutdown path, which says BYE when
//! the server knows about the client and then closes the transport exactly
//! once.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{exit_code, Error, Result};
use crate::network::Transport;
use crate::protocol::{Action, CloseReason, ProtocolState};

/// How a session ended
#[derive(Debug)]
pub enum Termination {
    /// The input stream ended
    EndOfInput,
    /// The cancellation token fired
    Interrupted,
    /// The protocol ended the session
    Closed(CloseReason),
    /// A fatal error occurred
    Failed(Error),
}

impl Termination {
    /// Maps the termination to the process exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::EndOfInput | Termination::Interrupted => exit_code::SUCCESS,
            Termination::Closed(reason) => reason.exit_code(),
            Termination::Failed(e) => e.exit_code(),
        }
    }

    fn sends_bye(&self) -> bool {
        match self {
            Termination::EndOfInput | Termination::Interrupted => true,
            Termination::Closed(reason) => reason.sends_bye(),
            Termination::Failed(e) => e.allows_farewell(),
        }
    }
}

/// A single chat session over one transport
pub struct Session<T, W> {
    /// Connection to the server
    transport: T,
    /// Protocol state machine
    protocol: ProtocolState,
    /// Sink for user-visible output
    out: W,
    /// Time allowed for a REPLY to AUTH or JOIN
    reply_timeout: Duration,
}

impl<T, W> Session<T, W>
where
    T: Transport,
    W: Write,
{
    /// Creates a session in the start state
    pub fn new(transport: T, out: W, reply_timeout: Duration) -> Self {
        Session {
            transport,
            protocol: ProtocolState::new(),
            out,
            reply_timeout,
        }
    }

    /// Runs the session until it ends and returns how it ended
    ///
    /// Input is not read while a REPLY is outstanding, so lines typed in the
    /// meantime are processed once the server has answered.
    pub async fn run<R>(mut self, input: R, cancel: CancellationToken) -> Termination
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut reply_deadline = Instant::now();

        let termination = loop {
            let awaiting = self.protocol.awaiting_reply();

            let actions = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("interrupted");
                    break Termination::Interrupted;
                }

                incoming = self.transport.recv() => match incoming {
                    Ok(message) => {
                        debug!(kind = message.kind(), "message received");
                        self.protocol.handle_message(message)
                    }
                    Err(e) if e.is_invalid_message() => self.protocol.handle_invalid(&e),
                    Err(e) => break Termination::Failed(e),
                },

                _ = sleep_until(reply_deadline), if awaiting => {
                    warn!(state = %self.protocol.state(), "reply timed out");
                    self.protocol.handle_reply_timeout()
                }

                line = lines.next_line(), if !awaiting => match line {
                    Ok(Some(line)) => self.protocol.handle_input(&line),
                    Ok(None) => {
                        info!("end of input");
                        break Termination::EndOfInput;
                    }
                    Err(e) => break Termination::Failed(e.into()),
                },
            };

            match self.apply(actions).await {
                Ok(Some(reason)) => break Termination::Closed(reason),
                Ok(None) => {}
                Err(e) => break Termination::Failed(e),
            }

            if !awaiting && self.protocol.awaiting_reply() {
                reply_deadline = Instant::now() + self.reply_timeout;
            }
        };

        self.shutdown(termination).await
    }

    /// Executes actions in order; stops at the first close request
    async fn apply(&mut self, actions: Vec<Action>) -> Result<Option<CloseReason>> {
        for action in actions {
            match action {
                Action::Send(message) => self.transport.send(&message).await?,
                Action::Print(line) => self.print(&line)?,
                Action::Close(reason) => return Ok(Some(reason)),
            }
        }
        Ok(None)
    }

    fn print(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }

    /// Says BYE when appropriate and closes the transport
    async fn shutdown(mut self, termination: Termination) -> Termination {
        if let Termination::Failed(e) = &termination {
            let report = format!("ERROR: {}", e);
            if let Err(print_error) = self.print(&report) {
                warn!(error = %print_error, "failed to report error");
            }
        }

        if termination.sends_bye() {
            if let Some(bye) = self.protocol.farewell() {
                debug!(state = %self.protocol.state(), "sending BYE");
                if let Err(e) = self.transport.send(&bye).await {
                    warn!(error = %e, "failed to send BYE");
                }
            }
        }

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "failed to close transport");
        }
        info!(exit_code = termination.exit_code(), "session finished");
        termination
    }
}
