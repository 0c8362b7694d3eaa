//! Core types for the IPK25-CHAT client
//!
//! This module contains the error taxonomy, exit codes and configuration
//! shared by every other part of the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{Config, TransportKind};

/// Default server port
pub const DEFAULT_PORT: u16 = 4567;

/// Default UDP confirmation timeout in milliseconds
pub const DEFAULT_UDP_TIMEOUT_MS: u64 = 250;

/// Default number of UDP retransmissions
pub const DEFAULT_UDP_RETRIES: u8 = 3;

/// Default time to wait for a REPLY to AUTH or JOIN, in milliseconds
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5000;

/// Maximum UDP datagram size in bytes
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Process exit statuses
pub mod exit_code {
    /// Normal termination
    pub const SUCCESS: i32 = 0;
    /// A required command line argument is missing
    pub const MISSING_ARGUMENT: i32 = 10;
    /// A command line argument has an invalid value or the host does not resolve
    pub const INVALID_ARGUMENT: i32 = 11;
    /// The connection could not be established or was lost
    pub const CONNECTION_FAILURE: i32 = 12;
    /// The server did not confirm or answer in time
    pub const PROTOCOL_TIMEOUT: i32 = 13;
    /// The server reported an error or sent an invalid message
    pub const SERVER_ERROR: i32 = 14;
    /// Anything else
    pub const INTERNAL: i32 = 99;
}
