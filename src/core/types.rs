use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Error;

/// Transport protocol carrying the chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited text grammar over a TCP stream
    Tcp,
    /// Binary frames over UDP with confirmations and retransmissions
    Udp,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            other => Err(Error::config(format!("{other} is not a valid transport (tcp|udp)"))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => f.write_str("tcp"),
            TransportKind::Udp => f.write_str("udp"),
        }
    }
}

/// Configuration for a chat client run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Transport protocol
    pub transport: TransportKind,
    /// Server hostname or IPv4 literal
    pub host: String,
    /// Server port
    pub port: u16,
    /// Time to wait for a CONFIRM before retransmitting (UDP)
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub udp_timeout: Duration,
    /// Number of retransmissions after the first send (UDP)
    pub udp_retries: u8,
    /// Time to wait for the REPLY to AUTH or JOIN
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub reply_timeout: Duration,
}

impl Config {
    /// Creates a configuration with default timing for the given server
    pub fn new(transport: TransportKind, host: impl Into<String>) -> Self {
        Config {
            transport,
            host: host.into(),
            port: super::DEFAULT_PORT,
            udp_timeout: Duration::from_millis(super::DEFAULT_UDP_TIMEOUT_MS),
            udp_retries: super::DEFAULT_UDP_RETRIES,
            reply_timeout: Duration::from_millis(super::DEFAULT_REPLY_TIMEOUT_MS),
        }
    }
}
