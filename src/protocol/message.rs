use std::fmt;

/// Protocol messages exchanged between client and server
///
/// The model is shared by both wire formats. UDP-only bookkeeping
/// (message identifiers, the referenced identifier of a REPLY) lives in
/// [`Frame`](super::binary::Frame), not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Authentication request
    Auth {
        /// Account name
        username: String,
        /// Name shown to other users
        display_name: String,
        /// Account secret
        secret: String,
    },

    /// Request to switch channels
    Join {
        /// Target channel
        channel_id: String,
        /// Name shown to other users
        display_name: String,
    },

    /// Chat message
    Msg {
        /// Author
        display_name: String,
        /// Message body
        content: String,
    },

    /// Error report, fatal for the session
    Err {
        /// Reporter
        display_name: String,
        /// Description of the problem
        content: String,
    },

    /// Session termination
    Bye {
        /// Sender, absent in the short text form
        display_name: Option<String>,
    },

    /// Positive outcome of AUTH or JOIN
    ReplyOk {
        /// Server explanation
        content: String,
    },

    /// Negative outcome of AUTH or JOIN
    ReplyNok {
        /// Server explanation
        content: String,
    },

    /// Acknowledgement of a UDP message
    Confirm {
        /// Identifier of the acknowledged message
        ref_id: u16,
    },

    /// Liveness probe from a UDP server
    Ping,
}

impl Message {
    /// Returns the protocol keyword for the message type
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Auth { .. } => "AUTH",
            Message::Join { .. } => "JOIN",
            Message::Msg { .. } => "MSG",
            Message::Err { .. } => "ERR",
            Message::Bye { .. } => "BYE",
            Message::ReplyOk { .. } | Message::ReplyNok { .. } => "REPLY",
            Message::Confirm { .. } => "CONFIRM",
            Message::Ping => "PING",
        }
    }

    /// Returns true for requests that the server answers with a REPLY
    pub fn expects_reply(&self) -> bool {
        matches!(self, Message::Auth { .. } | Message::Join { .. })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}
