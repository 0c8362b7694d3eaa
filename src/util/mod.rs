//! Utility module
//!
//! Local checks applied to user supplied fields before anything is sent.

use crate::core::{Error, Result};

/// Maximum length of a username or channel identifier
pub const MAX_ID_LENGTH: usize = 20;

/// Maximum length of a secret
pub const MAX_SECRET_LENGTH: usize = 128;

/// Maximum length of a display name
pub const MAX_DISPLAY_NAME_LENGTH: usize = 20;

/// Maximum length of message content
pub const MAX_CONTENT_LENGTH: usize = 60000;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_printable(c: char) -> bool {
    matches!(c, '\x21'..='\x7E')
}

fn check(field: &str, value: &str, max: usize, allowed: impl Fn(char) -> bool) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{field} must not be empty")));
    }
    if value.len() > max {
        return Err(Error::validation(format!(
            "{field} is longer than {max} characters"
        )));
    }
    if let Some(bad) = value.chars().find(|&c| !allowed(c)) {
        return Err(Error::validation(format!(
            "{field} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

/// Checks a username: `[A-Za-z0-9_-]`, at most 20 characters
pub fn validate_username(value: &str) -> Result<()> {
    check("Username", value, MAX_ID_LENGTH, is_id_char)
}

/// Checks a channel identifier: `[A-Za-z0-9_-]`, at most 20 characters
pub fn validate_channel_id(value: &str) -> Result<()> {
    check("Channel ID", value, MAX_ID_LENGTH, is_id_char)
}

/// Checks a secret: `[A-Za-z0-9_-]`, at most 128 characters
pub fn validate_secret(value: &str) -> Result<()> {
    check("Secret", value, MAX_SECRET_LENGTH, is_id_char)
}

/// Checks a display name: printable ASCII without space, at most 20 characters
pub fn validate_display_name(value: &str) -> Result<()> {
    check("Display name", value, MAX_DISPLAY_NAME_LENGTH, is_printable)
}

/// Checks message content: printable ASCII, space and line feed, at most 60000 characters
pub fn validate_content(value: &str) -> Result<()> {
    check("Message", value, MAX_CONTENT_LENGTH, |c| {
        is_printable(c) || c == ' ' || c == '\n'
    })
}
