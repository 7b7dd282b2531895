//! Frame encoding and decoding.
//!
//! # Responsibilities
//! - Serialize a `Message` into a self-describing byte frame
//! - Parse a frame back, validating every declared length against the buffer
//! - Read exactly one frame from an async stream (header, then payload)

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::message::{Message, StatusCode};

/// Fixed preamble (3 bytes) plus three u64 length fields.
pub const HEADER_LEN: usize = 3 + 3 * 8;

/// Largest `type` tag the one-byte length field can describe.
pub const MAX_TYPE_LEN: usize = u8::MAX as usize;

/// Errors raised while framing or parsing a message.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Buffer ended before the fixed header was complete.
    #[error("truncated header: need {HEADER_LEN} bytes, got {0}")]
    TruncatedHeader(usize),

    /// A declared field length runs past the end of the buffer.
    #[error("{field} length {declared} exceeds remaining {remaining} bytes")]
    FieldOverflow {
        field: &'static str,
        declared: u64,
        remaining: usize,
    },

    /// A text field is not valid UTF-8.
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// The status byte is outside the known set.
    #[error("unknown status code {0}")]
    UnknownStatus(u8),

    /// A field is too long for its length prefix.
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Declared payload exceeds the configured frame limit.
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { size: u64, max: usize },

    /// Socket I/O failed mid-frame.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Declared payload lengths parsed out of a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lengths {
    kind: u64,
    body: u64,
    target: u64,
    method: u64,
}

impl Lengths {
    /// Total payload size, or `None` on u64 overflow.
    fn payload(&self) -> Option<u64> {
        self.kind
            .checked_add(self.body)?
            .checked_add(self.target)?
            .checked_add(self.method)
    }
}

impl Message {
    /// Encode this message into a frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.kind.len() > MAX_TYPE_LEN {
            return Err(FrameError::FieldTooLong {
                field: "type",
                len: self.kind.len(),
                max: MAX_TYPE_LEN,
            });
        }

        let payload = self.kind.len() + self.body.len() + self.target.len() + self.method.len();
        let mut buf = Vec::with_capacity(HEADER_LEN + payload);

        buf.push(self.version);
        buf.push(self.status as u8);
        buf.push(self.kind.len() as u8);
        buf.extend_from_slice(&(self.body.len() as u64).to_le_bytes());
        buf.extend_from_slice(&(self.target.len() as u64).to_le_bytes());
        buf.extend_from_slice(&(self.method.len() as u64).to_le_bytes());

        buf.extend_from_slice(self.kind.as_bytes());
        buf.extend_from_slice(&self.body);
        buf.extend_from_slice(self.target.as_bytes());
        buf.extend_from_slice(self.method.as_bytes());

        Ok(buf)
    }

    /// Decode a message from a frame. Bytes past the declared payload are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let lengths = parse_header(buf)?;
        let status = StatusCode::try_from(buf[1]).map_err(FrameError::UnknownStatus)?;

        let mut cursor = Cursor {
            buf,
            pos: HEADER_LEN,
        };
        let kind = cursor.take("type", lengths.kind)?;
        let body = cursor.take("body", lengths.body)?;
        let target = cursor.take("target", lengths.target)?;
        let method = cursor.take("method", lengths.method)?;

        Ok(Self {
            version: buf[0],
            status,
            kind: utf8("type", kind)?,
            body: body.to_vec(),
            target: utf8("target", target)?,
            method: utf8("method", method)?,
        })
    }
}

fn parse_header(buf: &[u8]) -> Result<Lengths, FrameError> {
    if buf.len() < HEADER_LEN {
        return Err(FrameError::TruncatedHeader(buf.len()));
    }
    Ok(Lengths {
        kind: buf[2] as u64,
        body: read_u64(&buf[3..11]),
        target: read_u64(&buf[11..19]),
        method: read_u64(&buf[19..27]),
    })
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_le_bytes(raw)
}

fn utf8(field: &'static str, bytes: &[u8]) -> Result<String, FrameError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| FrameError::InvalidUtf8(field))
}

/// Forward-only reader over a frame buffer.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, field: &'static str, len: u64) -> Result<&'a [u8], FrameError> {
        let remaining = self.buf.len() - self.pos;
        if len > remaining as u64 {
            return Err(FrameError::FieldOverflow {
                field,
                declared: len,
                remaining,
            });
        }
        let start = self.pos;
        self.pos += len as usize;
        Ok(&self.buf[start..self.pos])
    }
}

/// Read exactly one frame from `reader`.
///
/// Reads the fixed header first, then exactly the declared payload, so frames
/// of any size up to `max_frame` are received whole regardless of how the
/// peer's writes are chunked.
pub async fn read_frame<R>(reader: &mut R, max_frame: usize) -> Result<Message, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let lengths = parse_header(&header)?;
    let payload = lengths.payload().ok_or(FrameError::FrameTooLarge {
        size: u64::MAX,
        max: max_frame,
    })?;
    let total = payload.saturating_add(HEADER_LEN as u64);
    if total > max_frame as u64 {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: max_frame,
        });
    }

    let mut frame = vec![0u8; total as usize];
    frame[..HEADER_LEN].copy_from_slice(&header);
    reader.read_exact(&mut frame[HEADER_LEN..]).await?;

    Message::decode(&frame)
}

/// Encode `message` and write it to `writer`.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = message.encode()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
