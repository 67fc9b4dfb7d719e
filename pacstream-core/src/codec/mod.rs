//! Tag-framed wire codec.
//!
//! Field encodings (all integers big-endian):
//!
//! ```text
//! string: u16 byte length, UTF-8 bytes
//! int32:  4 bytes
//! int64:  8 bytes
//! bytes:  int32 length, raw bytes
//! tag:    string ("AUTH", "CMD", "MSG", "FRM", "RES")
//! ```
//!
//! [`WireCodec`] plugs into `tokio_util`'s `FramedRead`/`FramedWrite`.
//! The decoder only yields a message once every field of it is buffered,
//! and a message is encoded into the write buffer as one unit, so a
//! single flush never carries half a message.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::{GameResult, Message, Tag};

/// Largest frame payload the codec accepts in either direction.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Largest string a 2-byte length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

// ── Write primitives ─────────────────────────────────────────────

pub fn write_tag(dst: &mut BytesMut, tag: Tag) -> Result<(), ProtocolError> {
    write_string(dst, tag.as_str())
}

pub fn write_string(dst: &mut BytesMut, s: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(s.len()).map_err(|_| ProtocolError::StringTooLong(s.len()))?;
    dst.reserve(2 + s.len());
    dst.put_u16(len);
    dst.put_slice(s.as_bytes());
    Ok(())
}

pub fn write_i32(dst: &mut BytesMut, v: i32) {
    dst.put_i32(v);
}

pub fn write_i64(dst: &mut BytesMut, v: i64) {
    dst.put_i64(v);
}

pub fn write_bytes(dst: &mut BytesMut, data: &[u8]) -> Result<(), ProtocolError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    dst.reserve(4 + data.len());
    // Bounded by MAX_FRAME_SIZE, so the cast is lossless.
    dst.put_i32(data.len() as i32);
    dst.put_slice(data);
    Ok(())
}

// ── Read primitives ──────────────────────────────────────────────

/// Cursor over buffered bytes.
///
/// Every `read_*` returns `Ok(None)` when the buffer does not yet hold the
/// whole field; the caller then waits for more data and restarts from the
/// beginning of the message.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    pub fn read_tag(&mut self) -> Result<Option<Tag>, ProtocolError> {
        match self.read_string()? {
            Some(token) => Tag::try_from(token.as_str()).map(Some),
            None => Ok(None),
        }
    }

    pub fn read_string(&mut self) -> Result<Option<String>, ProtocolError> {
        let Some(len) = self.take(2) else {
            return Ok(None);
        };
        let len = u16::from_be_bytes([len[0], len[1]]) as usize;
        let Some(raw) = self.take(len) else {
            return Ok(None);
        };
        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.take(4).map(|mut b| b.get_i32())
    }

    pub fn read_i64(&mut self) -> Option<i64> {
        self.take(8).map(|mut b| b.get_i64())
    }

    pub fn read_bytes(&mut self) -> Result<Option<&'a [u8]>, ProtocolError> {
        let Some(len) = self.read_i32() else {
            return Ok(None);
        };
        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(self.take(len))
    }

    /// Read one complete message, or `None` if any field is still missing.
    pub fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        let Some(tag) = self.read_tag()? else {
            return Ok(None);
        };

        let message = match tag {
            Tag::Auth => {
                let Some(step) = self.read_string()? else {
                    return Ok(None);
                };
                let Some(payload) = self.read_string()? else {
                    return Ok(None);
                };
                Message::Auth { step, payload }
            }
            Tag::Command => match self.read_string()? {
                Some(direction) => Message::Command(direction),
                None => return Ok(None),
            },
            Tag::Text => match self.read_string()? {
                Some(body) => Message::Text(body),
                None => return Ok(None),
            },
            Tag::Frame => match self.read_bytes()? {
                Some(data) => Message::Frame(bytes::Bytes::copy_from_slice(data)),
                None => return Ok(None),
            },
            Tag::Result => match self.read_string()? {
                Some(text) => Message::Result(GameResult::from_wire(&text)?),
                None => return Ok(None),
            },
        };

        Ok(Some(message))
    }
}

// ── WireCodec ────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct WireCodec;

impl Decoder for WireCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut reader = FieldReader::new(&src[..]);
        match reader.read_message()? {
            Some(message) => {
                let consumed = reader.position();
                src.advance(consumed);
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            // Clean EOF between messages.
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated {
                buffered: src.len(),
            }),
        }
    }
}

impl Encoder<Message> for WireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        let result = encode_fields(&item, dst);
        if result.is_err() {
            // Never leave half a message in the write buffer.
            dst.truncate(start);
        }
        result
    }
}

fn encode_fields(item: &Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    write_tag(dst, item.tag())?;
    match item {
        Message::Auth { step, payload } => {
            write_string(dst, step)?;
            write_string(dst, payload)?;
        }
        Message::Command(direction) => write_string(dst, direction)?,
        Message::Text(body) => write_string(dst, body)?,
        Message::Frame(data) => write_bytes(dst, data)?,
        Message::Result(result) => write_string(dst, &result.to_wire())?,
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
