//! UDP binary framing
//!
//! Every frame starts with a type tag followed by a big-endian message
//! identifier. Strings are NUL terminated on the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::core::{Error, Result};
use super::message::Message;

/// Frame type tags
pub mod tag {
    /// Acknowledgement
    pub const CONFIRM: u8 = 0x00;
    /// Outcome of AUTH or JOIN
    pub const REPLY: u8 = 0x01;
    /// Authentication request
    pub const AUTH: u8 = 0x02;
    /// Channel switch request
    pub const JOIN: u8 = 0x03;
    /// Chat message
    pub const MSG: u8 = 0x04;
    /// Liveness probe
    pub const PING: u8 = 0xFD;
    /// Error report
    pub const ERR: u8 = 0xFE;
    /// Session termination
    pub const BYE: u8 = 0xFF;
}

/// A UDP datagram: a message plus its reliability bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identifier of this datagram; for CONFIRM the acknowledged identifier
    pub msg_id: u16,
    /// Identifier of the request a REPLY answers
    pub ref_msg_id: Option<u16>,
    /// Payload
    pub message: Message,
}

impl Frame {
    /// Creates a frame for a message that is not a REPLY
    pub fn new(msg_id: u16, message: Message) -> Self {
        Frame {
            msg_id,
            ref_msg_id: None,
            message,
        }
    }

    /// Creates a REPLY frame answering `ref_msg_id`
    pub fn reply(msg_id: u16, ref_msg_id: u16, message: Message) -> Self {
        Frame {
            msg_id,
            ref_msg_id: Some(ref_msg_id),
            message,
        }
    }

    /// Creates a CONFIRM for `ref_id`
    pub fn confirm(ref_id: u16) -> Self {
        Frame::new(ref_id, Message::Confirm { ref_id })
    }

    /// Serializes the frame
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(64);
        match &self.message {
            Message::Confirm { ref_id } => {
                dst.put_u8(tag::CONFIRM);
                dst.put_u16(*ref_id);
            }
            Message::ReplyOk { content } | Message::ReplyNok { content } => {
                let result = u8::from(matches!(self.message, Message::ReplyOk { .. }));
                dst.put_u8(tag::REPLY);
                dst.put_u16(self.msg_id);
                dst.put_u8(result);
                dst.put_u16(self.ref_msg_id.unwrap_or_default());
                put_str(&mut dst, content);
            }
            Message::Auth { username, display_name, secret } => {
                dst.put_u8(tag::AUTH);
                dst.put_u16(self.msg_id);
                put_str(&mut dst, username);
                put_str(&mut dst, display_name);
                put_str(&mut dst, secret);
            }
            Message::Join { channel_id, display_name } => {
                dst.put_u8(tag::JOIN);
                dst.put_u16(self.msg_id);
                put_str(&mut dst, channel_id);
                put_str(&mut dst, display_name);
            }
            Message::Msg { display_name, content } => {
                dst.put_u8(tag::MSG);
                dst.put_u16(self.msg_id);
                put_str(&mut dst, display_name);
                put_str(&mut dst, content);
            }
            Message::Err { display_name, content } => {
                dst.put_u8(tag::ERR);
                dst.put_u16(self.msg_id);
                put_str(&mut dst, display_name);
                put_str(&mut dst, content);
            }
            Message::Bye { display_name } => {
                dst.put_u8(tag::BYE);
                dst.put_u16(self.msg_id);
                put_str(&mut dst, display_name.as_deref().unwrap_or_default());
            }
            Message::Ping => {
                dst.put_u8(tag::PING);
                dst.put_u16(self.msg_id);
            }
        }
        dst.freeze()
    }

    /// Parses a received datagram
    pub fn decode(datagram: &[u8]) -> Result<Frame> {
        let mut reader = FrameReader::new(datagram);
        let frame_tag = reader.u8("type")?;
        let msg_id = reader.u16("message id")?;

        let frame = match frame_tag {
            tag::CONFIRM => Frame::confirm(msg_id),
            tag::REPLY => {
                let result = reader.u8("result")?;
                let ref_msg_id = reader.u16("reference id")?;
                let content = reader.string("content")?;
                let message = match result {
                    0 => Message::ReplyNok { content },
                    1 => Message::ReplyOk { content },
                    other => return Err(Error::malformed(format!("invalid REPLY result {other}"))),
                };
                Frame::reply(msg_id, ref_msg_id, message)
            }
            tag::AUTH => Frame::new(
                msg_id,
                Message::Auth {
                    username: reader.string("username")?,
                    display_name: reader.string("display name")?,
                    secret: reader.string("secret")?,
                },
            ),
            tag::JOIN => Frame::new(
                msg_id,
                Message::Join {
                    channel_id: reader.string("channel id")?,
                    display_name: reader.string("display name")?,
                },
            ),
            tag::MSG => Frame::new(
                msg_id,
                Message::Msg {
                    display_name: reader.string("display name")?,
                    content: reader.string("content")?,
                },
            ),
            tag::ERR => Frame::new(
                msg_id,
                Message::Err {
                    display_name: reader.string("display name")?,
                    content: reader.string("content")?,
                },
            ),
            tag::BYE => {
                let name = reader.string("display name")?;
                let display_name = if name.is_empty() { None } else { Some(name) };
                Frame::new(msg_id, Message::Bye { display_name })
            }
            tag::PING => Frame::new(msg_id, Message::Ping),
            other => return Err(Error::malformed(format!("unknown frame type 0x{other:02X}"))),
        };
        Ok(frame)
    }
}

/// Reads the type tag and message identifier of a datagram, if present
///
/// Used to acknowledge frames whose body cannot be decoded.
pub fn peek_header(datagram: &[u8]) -> Option<(u8, u16)> {
    let mut reader = FrameReader::new(datagram);
    let frame_tag = reader.u8("type").ok()?;
    let msg_id = reader.u16("message id").ok()?;
    Some((frame_tag, msg_id))
}

fn put_str(dst: &mut BytesMut, value: &str) {
    dst.put_slice(value.as_bytes());
    dst.put_u8(0);
}

/// Bounds-checked cursor over a received datagram
struct FrameReader<'a> {
    buf: &'a [u8],
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        FrameReader { buf }
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        if self.buf.remaining() < 1 {
            return Err(Error::malformed(format!("frame too short for {field}")));
        }
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self, field: &str) -> Result<u16> {
        if self.buf.remaining() < 2 {
            return Err(Error::malformed(format!("frame too short for {field}")));
        }
        Ok(self.buf.get_u16())
    }

    /// Reads up to the next NUL or the end of the frame
    fn string(&mut self, field: &str) -> Result<String> {
        let end = self.buf.iter().position(|&b| b == 0).unwrap_or(self.buf.len());
        let value = std::str::from_utf8(&self.buf[..end])
            .map_err(|_| Error::malformed(format!("{field} is not valid UTF-8")))?
            .to_string();
        let consumed = (end + 1).min(self.buf.len());
        self.buf.advance(consumed);
        Ok(value)
    }
}
