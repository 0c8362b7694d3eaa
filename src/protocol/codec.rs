use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::Error;

/// Protocol line terminator
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Longest accepted line, terminator excluded
pub const MAX_LINE_LENGTH: usize = 65535;

/// Codec framing a TCP byte stream into CR LF terminated lines
///
/// The read buffer handed to [`Decoder::decode`] is the session's receive
/// buffer: complete lines are split off its front, a trailing partial line
/// stays until more bytes arrive.
#[derive(Clone, Debug, Default)]
pub struct LineCodec {
    /// Bytes of the buffer already searched for a terminator
    scanned: usize,
}

impl LineCodec {
    /// Creates a new line codec
    pub fn new() -> Self {
        LineCodec::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A CR at the end of the previous scan may pair with the next LF
        let start = self.scanned.saturating_sub(1);
        let found = src[start..]
            .windows(LINE_TERMINATOR.len())
            .position(|window| window == LINE_TERMINATOR)
            .map(|offset| start + offset);

        match found {
            Some(end) => {
                self.scanned = 0;
                let line = src.split_to(end);
                src.advance(LINE_TERMINATOR.len());
                let line = String::from_utf8(line.to_vec())
                    .map_err(|_| Error::malformed("line is not valid UTF-8"))?;
                Ok(Some(line))
            }
            None if src.len() > MAX_LINE_LENGTH => {
                src.clear();
                self.scanned = 0;
                Err(Error::malformed("line exceeds maximum length"))
            }
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                // An unterminated tail is dropped with the connection
                src.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(line.len() + LINE_TERMINATOR.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(LINE_TERMINATOR);
        Ok(())
    }
}
