//! Session state machine
//!
//! [`ProtocolState`] consumes local commands and decoded server messages and
//! produces [`Action`]s for the session to execute. It performs no I/O, so
//! the same transition table serves both transports.

use std::fmt;

use tracing::debug;

use crate::core::{exit_code, Error};
use crate::util;
use super::command::{Command, HELP_TEXT};
use super::message::Message;

/// Content sent in ERR when the server's message cannot be handled
pub const INVALID_MESSAGE: &str = "invalid message";

/// Represents the current state of the chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not authenticated
    Start,
    /// AUTH sent, waiting for the REPLY
    Auth,
    /// Authenticated and in a channel
    Open,
    /// JOIN sent, waiting for the REPLY
    Join,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Start => "start",
            SessionState::Auth => "auth",
            SessionState::Open => "open",
            SessionState::Join => "join",
        };
        f.write_str(name)
    }
}

/// Why the session ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server said BYE
    ServerBye,
    /// The server sent ERR
    ServerError,
    /// The server sent something unparseable or illegal in the current state
    InvalidMessage(String),
    /// No REPLY to AUTH or JOIN arrived in time
    ReplyTimeout,
}

impl CloseReason {
    /// Returns whether the client still has to say BYE
    pub fn sends_bye(&self) -> bool {
        !matches!(self, CloseReason::ServerBye)
    }

    /// Maps the reason to the process exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            CloseReason::ServerBye => exit_code::SUCCESS,
            CloseReason::ServerError | CloseReason::InvalidMessage(_) => exit_code::SERVER_ERROR,
            CloseReason::ReplyTimeout => exit_code::PROTOCOL_TIMEOUT,
        }
    }
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Transmit a message to the server
    Send(Message),
    /// Print a line for the user
    Print(String),
    /// End the session
    Close(CloseReason),
}

/// Protocol state machine for a single chat session
#[derive(Debug)]
pub struct ProtocolState {
    /// Current state
    state: SessionState,
    /// Name stamped on outgoing messages
    display_name: Option<String>,
    /// Whether AUTH was ever sent; the server knows us from then on
    engaged: bool,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolState {
    /// Creates a state machine in [`SessionState::Start`]
    pub fn new() -> Self {
        ProtocolState {
            state: SessionState::Start,
            display_name: None,
            engaged: false,
        }
    }

    /// Returns the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the current display name
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns true while a REPLY to AUTH or JOIN is outstanding
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.state, SessionState::Auth | SessionState::Join)
    }

    /// Returns the BYE to send on shutdown, if the server knows about us
    pub fn farewell(&self) -> Option<Message> {
        if !self.engaged {
            return None;
        }
        Some(Message::Bye {
            display_name: self.display_name.clone(),
        })
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state change");
            self.state = next;
        }
    }

    /// ERR for the server, only once it knows about us
    fn report(&self, content: &str) -> Option<Action> {
        let display_name = self.display_name.clone().filter(|_| self.engaged)?;
        Some(Action::Send(Message::Err {
            display_name,
            content: content.to_string(),
        }))
    }

    fn local_error(message: impl fmt::Display) -> Vec<Action> {
        vec![Action::Print(format!("ERROR: {message}"))]
    }

    /// Handles a raw line of user input
    pub fn handle_input(&mut self, line: &str) -> Vec<Action> {
        match Command::parse(line) {
            Ok(Some(command)) => self.handle_command(command),
            Ok(None) => Vec::new(),
            Err(e) => Self::local_error(e),
        }
    }

    /// Handles a parsed local command
    ///
    /// Rejected commands only produce an `ERROR:` line; the state is left
    /// untouched and nothing is sent.
    pub fn handle_command(&mut self, command: Command) -> Vec<Action> {
        match command {
            Command::Help => vec![Action::Print(HELP_TEXT.to_string())],

            Command::Rename { display_name } => match util::validate_display_name(&display_name) {
                Ok(()) => {
                    self.display_name = Some(display_name);
                    Vec::new()
                }
                Err(e) => Self::local_error(e),
            },

            Command::Auth { username, secret, display_name } => {
                if self.state != SessionState::Start {
                    return Self::local_error("already authenticated");
                }
                let checked = util::validate_username(&username)
                    .and_then(|_| util::validate_secret(&secret))
                    .and_then(|_| util::validate_display_name(&display_name));
                if let Err(e) = checked {
                    return Self::local_error(e);
                }

                self.display_name = Some(display_name.clone());
                self.engaged = true;
                self.transition(SessionState::Auth);
                vec![Action::Send(Message::Auth {
                    username,
                    display_name,
                    secret,
                })]
            }

            Command::Join { channel_id } => {
                if self.state != SessionState::Open {
                    return Self::local_error("/join requires an authenticated session");
                }
                if let Err(e) = util::validate_channel_id(&channel_id) {
                    return Self::local_error(e);
                }
                let Some(display_name) = self.display_name.clone() else {
                    return Self::local_error("no display name set");
                };

                self.transition(SessionState::Join);
                vec![Action::Send(Message::Join {
                    channel_id,
                    display_name,
                })]
            }

            Command::Chat { content } => {
                if !matches!(self.state, SessionState::Open | SessionState::Join) {
                    return Self::local_error("authenticate with /auth before sending messages");
                }
                if let Err(e) = util::validate_content(&content) {
                    return Self::local_error(e);
                }
                let Some(display_name) = self.display_name.clone() else {
                    return Self::local_error("no display name set");
                };
                vec![Action::Send(Message::Msg {
                    display_name,
                    content,
                })]
            }
        }
    }

    /// Handles a decoded message from the server
    pub fn handle_message(&mut self, message: Message) -> Vec<Action> {
        match (self.state, message) {
            (_, Message::Err { display_name, content }) => vec![
                Action::Print(format!("ERROR FROM {display_name}: {content}")),
                Action::Close(CloseReason::ServerError),
            ],

            (SessionState::Open | SessionState::Join, Message::Bye { .. }) => {
                vec![Action::Close(CloseReason::ServerBye)]
            }

            // Acknowledgements are consumed by the transport
            (_, Message::Confirm { .. } | Message::Ping) => Vec::new(),

            (SessionState::Auth, Message::ReplyOk { content }) => {
                self.transition(SessionState::Open);
                vec![Action::Print(format!("Action Success: {content}"))]
            }

            (SessionState::Auth, Message::ReplyNok { content }) => {
                self.transition(SessionState::Start);
                vec![Action::Print(format!("Action Failure: {content}"))]
            }

            // Any REPLY in Join settles the JOIN, whatever arrived before it
            (SessionState::Open | SessionState::Join, Message::ReplyOk { content }) => {
                self.transition(SessionState::Open);
                vec![Action::Print(format!("Action Success: {content}"))]
            }

            (SessionState::Open | SessionState::Join, Message::ReplyNok { content }) => {
                self.transition(SessionState::Open);
                vec![Action::Print(format!("Action Failure: {content}"))]
            }

            (SessionState::Open | SessionState::Join, Message::Msg { display_name, content }) => {
                vec![Action::Print(format!("{display_name}: {content}"))]
            }

            (state, other) => self.handle_invalid(&Error::protocol_violation(format!(
                "unexpected {} in {state} state",
                other.kind()
            ))),
        }
    }

    /// Handles an inbound frame that could not be decoded or is not allowed
    pub fn handle_invalid(&mut self, error: &Error) -> Vec<Action> {
        let mut actions = vec![Action::Print(format!("ERROR: {error}"))];
        actions.extend(self.report(INVALID_MESSAGE));
        actions.push(Action::Close(CloseReason::InvalidMessage(error.to_string())));
        actions
    }

    /// Handles expiry of the REPLY deadline
    pub fn handle_reply_timeout(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::Print(format!(
            "ERROR: no reply from server while in {} state",
            self.state
        ))];
        actions.extend(self.report("no reply received"));
        actions.push(Action::Close(CloseReason::ReplyTimeout));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticated() -> ProtocolState {
        let mut state = ProtocolState::new();
        state.handle_input("/auth user secret Dan");
        state.handle_message(Message::ReplyOk { content: "welcome".into() });
        assert_eq!(state.state(), SessionState::Open);
        state
    }

    fn sends(actions: &[Action]) -> usize {
        actions.iter().filter(|a| matches!(a, Action::Send(_))).count()
    }

    #[test]
    fn test_auth_success() {
        let mut state = ProtocolState::new();
        let actions = state.handle_input("/auth u s d");
        assert_eq!(
            actions,
            vec![Action::Send(Message::Auth {
                username: "u".into(),
                display_name: "d".into(),
                secret: "s".into(),
            })]
        );
        assert_eq!(state.state(), SessionState::Auth);
        assert!(state.awaiting_reply());

        let actions = state.handle_message(Message::ReplyOk { content: "hi".into() });
        assert_eq!(actions, vec![Action::Print("Action Success: hi".into())]);
        assert_eq!(state.state(), SessionState::Open);
    }

    #[test]
    fn test_auth_failure_returns_to_start() {
        let mut state = ProtocolState::new();
        state.handle_input("/auth u s d");
        let actions = state.handle_message(Message::ReplyNok { content: "bad".into() });
        assert_eq!(actions, vec![Action::Print("Action Failure: bad".into())]);
        assert_eq!(state.state(), SessionState::Start);

        // A second attempt is allowed
        assert_eq!(sends(&state.handle_input("/auth u s2 d")), 1);
    }

    #[test]
    fn test_start_only_accepts_auth() {
        let mut state = ProtocolState::new();
        for line in ["/join general", "hello", "/auth bad.user s d"] {
            let actions = state.handle_input(line);
            assert_eq!(sends(&actions), 0, "line: {line}");
            assert!(matches!(&actions[0], Action::Print(p) if p.starts_with("ERROR: ")));
            assert_eq!(state.state(), SessionState::Start);
        }
        assert!(state.farewell().is_none());
    }

    #[test]
    fn test_rename_is_local() {
        let mut state = authenticated();
        assert!(state.handle_input("/rename Bob").is_empty());
        assert_eq!(state.display_name(), Some("Bob"));

        let actions = state.handle_input("hey");
        assert_eq!(
            actions,
            vec![Action::Send(Message::Msg {
                display_name: "Bob".into(),
                content: "hey".into(),
            })]
        );
    }

    #[test]
    fn test_rename_rejects_long_name() {
        let mut state = authenticated();
        let actions = state.handle_input(&format!("/rename {}", "x".repeat(21)));
        assert_eq!(sends(&actions), 0);
        assert!(matches!(&actions[0], Action::Print(p) if p.starts_with("ERROR: ")));
        assert_eq!(state.display_name(), Some("Dan"));
    }

    #[test]
    fn test_join_cycle() {
        let mut state = authenticated();
        let actions = state.handle_input("/join general");
        assert_eq!(
            actions,
            vec![Action::Send(Message::Join {
                channel_id: "general".into(),
                display_name: "Dan".into(),
            })]
        );
        assert_eq!(state.state(), SessionState::Join);

        // Messages keep flowing while the JOIN is pending
        let actions = state.handle_message(Message::Msg {
            display_name: "Server".into(),
            content: "Dan joined general".into(),
        });
        assert_eq!(actions, vec![Action::Print("Server: Dan joined general".into())]);
        assert_eq!(state.state(), SessionState::Join);

        let actions = state.handle_message(Message::ReplyNok { content: "no such channel".into() });
        assert_eq!(actions, vec![Action::Print("Action Failure: no such channel".into())]);
        assert_eq!(state.state(), SessionState::Open);
    }

    #[test]
    fn test_server_error_closes() {
        let mut state = authenticated();
        let actions = state.handle_message(Message::Err {
            display_name: "Server".into(),
            content: "boom".into(),
        });
        assert_eq!(
            actions,
            vec![
                Action::Print("ERROR FROM Server: boom".into()),
                Action::Close(CloseReason::ServerError),
            ]
        );
        assert_eq!(state.farewell(), Some(Message::Bye { display_name: Some("Dan".into()) }));
    }

    #[test]
    fn test_server_bye_closes_without_farewell() {
        let mut state = authenticated();
        let actions = state.handle_message(Message::Bye { display_name: Some("Server".into()) });
        assert_eq!(actions, vec![Action::Close(CloseReason::ServerBye)]);
        assert!(!CloseReason::ServerBye.sends_bye());
    }

    #[test]
    fn test_unexpected_message_in_auth() {
        let mut state = ProtocolState::new();
        state.handle_input("/auth u s d");
        let actions = state.handle_message(Message::Msg {
            display_name: "x".into(),
            content: "y".into(),
        });
        assert!(matches!(actions.last(), Some(Action::Close(CloseReason::InvalidMessage(_)))));
        assert!(actions.contains(&Action::Send(Message::Err {
            display_name: "d".into(),
            content: INVALID_MESSAGE.into(),
        })));
    }

    #[test]
    fn test_invalid_before_auth_sends_no_err() {
        let mut state = ProtocolState::new();
        let actions = state.handle_message(Message::ReplyOk { content: "?".into() });
        assert_eq!(sends(&actions), 0);
        assert!(matches!(actions.last(), Some(Action::Close(_))));
    }

    #[test]
    fn test_bye_while_authenticating_is_invalid() {
        let mut state = ProtocolState::new();
        state.handle_input("/auth u s d");
        let actions = state.handle_message(Message::Bye { display_name: Some("Server".into()) });
        assert_eq!(sends(&actions), 1);
        assert!(matches!(actions.last(), Some(Action::Close(CloseReason::InvalidMessage(_)))));
        assert_eq!(
            CloseReason::InvalidMessage(String::new()).exit_code(),
            exit_code::SERVER_ERROR
        );
    }

    #[test]
    fn test_bye_before_auth_is_invalid() {
        let mut state = ProtocolState::new();
        let actions = state.handle_message(Message::Bye { display_name: None });
        assert_eq!(sends(&actions), 0);
        assert!(matches!(actions.last(), Some(Action::Close(CloseReason::InvalidMessage(_)))));
    }

    #[test]
    fn test_renamed_but_unauthenticated_sends_no_err() {
        let mut state = ProtocolState::new();
        state.handle_input("/rename Bob");
        let actions = state.handle_message(Message::Msg {
            display_name: "x".into(),
            content: "y".into(),
        });
        assert_eq!(sends(&actions), 0);
        assert!(matches!(actions.last(), Some(Action::Close(CloseReason::InvalidMessage(_)))));
    }

    #[test]
    fn test_reply_timeout() {
        let mut state = ProtocolState::new();
        state.handle_input("/auth u s d");
        let actions = state.handle_reply_timeout();
        assert_eq!(sends(&actions), 1);
        assert_eq!(actions.last(), Some(&Action::Close(CloseReason::ReplyTimeout)));
        assert_eq!(CloseReason::ReplyTimeout.exit_code(), exit_code::PROTOCOL_TIMEOUT);
    }

    #[test]
    fn test_help() {
        let mut state = ProtocolState::new();
        assert_eq!(state.handle_input("/help"), vec![Action::Print(HELP_TEXT.to_string())]);
    }
}
