use std::io;
use thiserror::Error;

use super::exit_code;

/// Error types for the IPK25-CHAT client
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unable to resolve server address: {0}")]
    Resolution(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Server has closed the connection")]
    ConnectionClosed,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("{0}")]
    Validation(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Error::Resolution(msg.into())
    }

    /// Creates a new connection error
    pub fn connect(msg: impl Into<String>) -> Self {
        Error::Connect(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Creates a new malformed message error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedMessage(msg.into())
    }

    /// Creates a new protocol violation error
    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Error::ProtocolViolation(msg.into())
    }

    /// Creates a new local validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Returns true when the error was caused by an unusable inbound frame
    pub fn is_invalid_message(&self) -> bool {
        matches!(self, Error::MalformedMessage(_) | Error::ProtocolViolation(_))
    }

    /// Returns false when the transport is gone and a BYE cannot be delivered
    pub fn allows_farewell(&self) -> bool {
        !matches!(self, Error::ConnectionClosed | Error::Connect(_))
    }

    /// Maps the error to the process exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Resolution(_) | Error::Validation(_) => {
                exit_code::INVALID_ARGUMENT
            }
            Error::Connect(_) | Error::ConnectionClosed => exit_code::CONNECTION_FAILURE,
            Error::Timeout(_) => exit_code::PROTOCOL_TIMEOUT,
            Error::MalformedMessage(_) | Error::ProtocolViolation(_) => exit_code::SERVER_ERROR,
            Error::Io(_) => exit_code::INTERNAL,
        }
    }
}
