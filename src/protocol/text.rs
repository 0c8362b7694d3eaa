//! TCP text grammar
//!
//! Lines are handled here without their CR LF terminator; framing is the
//! job of [`LineCodec`](super::codec::LineCodec).

use crate::core::{Error, Result};
use super::message::Message;

/// Renders a message as a protocol line without the terminator
pub fn encode(message: &Message) -> Result<String> {
    let line = match message {
        Message::Auth { username, display_name, secret } => {
            format!("AUTH {username} AS {display_name} USING {secret}")
        }
        Message::Join { channel_id, display_name } => {
            format!("JOIN {channel_id} AS {display_name}")
        }
        Message::Msg { display_name, content } => format!("MSG FROM {display_name} IS {content}"),
        Message::Err { display_name, content } => format!("ERR FROM {display_name} IS {content}"),
        Message::Bye { display_name: Some(name) } => format!("BYE FROM {name}"),
        Message::Bye { display_name: None } => "BYE".to_string(),
        Message::ReplyOk { content } => format!("REPLY OK IS {content}"),
        Message::ReplyNok { content } => format!("REPLY NOK IS {content}"),
        Message::Confirm { .. } | Message::Ping => {
            return Err(Error::protocol_violation(format!(
                "{} has no text representation",
                message.kind()
            )));
        }
    };
    Ok(line)
}

/// Parses a protocol line (without CR LF) into a message
pub fn decode(line: &str) -> Result<Message> {
    if let Some(content) = line.strip_prefix("REPLY OK IS ") {
        return Ok(Message::ReplyOk { content: content.to_string() });
    }
    if let Some(content) = line.strip_prefix("REPLY NOK IS ") {
        return Ok(Message::ReplyNok { content: content.to_string() });
    }
    if let Some(rest) = line.strip_prefix("MSG FROM ") {
        let (display_name, content) = split_sender(rest, line)?;
        return Ok(Message::Msg { display_name, content });
    }
    if let Some(rest) = line.strip_prefix("ERR FROM ") {
        let (display_name, content) = split_sender(rest, line)?;
        return Ok(Message::Err { display_name, content });
    }
    if let Some(name) = line.strip_prefix("BYE FROM ") {
        return Ok(Message::Bye { display_name: Some(single_token(name, line)?) });
    }
    if line == "BYE" {
        return Ok(Message::Bye { display_name: None });
    }
    if let Some(rest) = line.strip_prefix("AUTH ") {
        let (username, credentials) = rest
            .split_once(" AS ")
            .ok_or_else(|| Error::malformed(format!("missing AS separator: {line}")))?;
        let (display_name, secret) = split_keyword(credentials, " USING ", line)?;
        let username = single_token(username, line)?;
        return Ok(Message::Auth { username, display_name, secret });
    }
    if let Some(rest) = line.strip_prefix("JOIN ") {
        let (channel_id, display_name) = split_keyword(rest, " AS ", line)?;
        return Ok(Message::Join { channel_id, display_name });
    }

    Err(Error::malformed(format!("unknown message: {line}")))
}

/// Splits `<sender> IS <content>`
fn split_sender(rest: &str, line: &str) -> Result<(String, String)> {
    let (sender, content) = rest
        .split_once(" IS ")
        .ok_or_else(|| Error::malformed(format!("missing IS separator: {line}")))?;
    Ok((single_token(sender, line)?, content.to_string()))
}

/// Splits `<token><keyword><token>` where both sides are single words
fn split_keyword(rest: &str, keyword: &str, line: &str) -> Result<(String, String)> {
    let (left, right) = rest
        .split_once(keyword)
        .ok_or_else(|| Error::malformed(format!("missing{keyword}separator: {line}")))?;
    Ok((single_token(left, line)?, single_token(right, line)?))
}

fn single_token(value: &str, line: &str) -> Result<String> {
    if value.is_empty() || value.contains(' ') {
        return Err(Error::malformed(format!("invalid field in: {line}")));
    }
    Ok(value.to_string())
}
