use crate::core::{Error, Result};

/// Usage summary printed by `/help`
pub const HELP_TEXT: &str = "Supported commands:
  /auth <username> <secret> <displayname>  authenticate with the server
  /join <channel>                          switch to another channel
  /rename <displayname>                    change the local display name
  /help                                    print this help
Any other line is sent as a chat message.";

/// A line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/auth <username> <secret> <displayname>`
    Auth {
        /// Account name
        username: String,
        /// Account secret
        secret: String,
        /// Name to use in the session
        display_name: String,
    },
    /// `/join <channel>`
    Join {
        /// Target channel
        channel_id: String,
    },
    /// `/rename <displayname>`
    Rename {
        /// New display name
        display_name: String,
    },
    /// `/help`
    Help,
    /// Anything that does not start with `/`
    Chat {
        /// Message body
        content: String,
    },
}

impl Command {
    /// Parses one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        if !line.starts_with('/') {
            return Ok(Some(Command::Chat { content: line.to_string() }));
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let command = match (name, args.as_slice()) {
            ("/auth", [username, secret, display_name]) => Command::Auth {
                username: username.to_string(),
                secret: secret.to_string(),
                display_name: display_name.to_string(),
            },
            ("/auth", _) => return Err(Error::validation("usage: /auth <username> <secret> <displayname>")),
            ("/join", [channel_id]) => Command::Join { channel_id: channel_id.to_string() },
            ("/join", _) => return Err(Error::validation("usage: /join <channel>")),
            ("/rename", [display_name]) => Command::Rename { display_name: display_name.to_string() },
            ("/rename", _) => return Err(Error::validation("usage: /rename <displayname>")),
            ("/help", []) => Command::Help,
            ("/help", _) => return Err(Error::validation("usage: /help")),
            (other, _) => return Err(Error::validation(format!("unknown command {other}, try /help"))),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/auth user secret Dan").unwrap(),
            Some(Command::Auth {
                username: "user".into(),
                secret: "secret".into(),
                display_name: "Dan".into(),
            })
        );
        assert_eq!(
            Command::parse("/join  general\r").unwrap(),
            Some(Command::Join { channel_id: "general".into() })
        );
        assert_eq!(
            Command::parse("/rename Bob").unwrap(),
            Some(Command::Rename { display_name: "Bob".into() })
        );
        assert_eq!(Command::parse("/help").unwrap(), Some(Command::Help));
    }

    #[test]
    fn test_parse_chat_and_blank() {
        assert_eq!(
            Command::parse("hello  world ").unwrap(),
            Some(Command::Chat { content: "hello  world ".into() })
        );
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("/auth user secret").is_err());
        assert!(Command::parse("/join a b").is_err());
        assert!(Command::parse("/rename").is_err());
        assert!(Command::parse("/quit").is_err());
    }
}
