//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Every value starts with a one-byte type tag and text lines end in CRLF:
//! ```text
//! +OK\r\n                      simple string
//! -ERR message\r\n             error
//! :1000\r\n                    integer
//! $5\r\nhello\r\n              bulk string ($-1\r\n is null)
//! *2\r\n$3\r\nfoo\r\n:1\r\n    array (*-1\r\n is null)
//! ```
//!
//! Bulk strings are delimited by their declared length, so the payload may
//! contain CR and LF. A failure inside an array fails the whole array.
//!
//! Decoding works on whatever bytes have arrived so far: a value that is not
//! complete yet reports [`DecodeError::Incomplete`] and nothing is consumed.
//! [`Decoder`] keeps its place in a growing buffer so bytes are only examined
//! once per value.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};

use super::value::{
    Value, ARRAY_TAG, BULK_STRING_TAG, ERROR_TAG, INTEGER_TAG, SIMPLE_STRING_TAG,
};
use crate::error::{DecodeError, KvError, Result};

/// Largest bulk string payload accepted (512 MB)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Deepest array nesting accepted
pub const MAX_NESTING_DEPTH: usize = 32;

/// Chunk size used by the blocking stream helpers
const STREAM_CHUNK_SIZE: usize = 1024;

/// Declared array lengths are untrusted; cap the up-front allocation
const ARRAY_PREALLOC_LIMIT: usize = 64;

const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Decoding
// =============================================================================

/// Decode one value from the front of `buf`
///
/// Returns the value and the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> std::result::Result<(Value, usize), DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::EmptyStream);
    }

    let len = Decoder::new().scan(buf)?.ok_or(DecodeError::Incomplete)?;
    let frame = Bytes::copy_from_slice(&buf[..len]);
    let mut pos = 0;
    Ok((parse_value(&frame, &mut pos)?, len))
}

/// Incremental decoder for a connection buffer
///
/// Remembers how far the buffered bytes have been validated, so each call only
/// looks at bytes appended since the previous one. Once a value is complete it
/// is split off the buffer and its payloads are sliced out of it without
/// copying.
///
/// The buffer must only grow between calls; after a value is taken or an error
/// is returned the decoder starts over at the new front of the buffer.
#[derive(Debug, Default)]
pub struct Decoder {
    /// Start of the next item not validated yet
    pos: usize,

    /// Where the LF search for the item at `pos` resumes
    scan_from: usize,

    /// End (past the trailing CRLF) of a bulk payload still arriving
    bulk_end: Option<usize>,

    /// Children still expected by each open array, outermost first
    open_arrays: Vec<usize>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one complete value off the front of `buffer`
    ///
    /// Returns `Ok(None)` when the buffer does not hold a complete value yet.
    pub fn decode(
        &mut self,
        buffer: &mut BytesMut,
    ) -> std::result::Result<Option<Value>, DecodeError> {
        let len = match self.scan(&buffer[..]) {
            Ok(Some(len)) => len,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        self.reset();

        let frame = buffer.split_to(len).freeze();
        let mut pos = 0;
        parse_value(&frame, &mut pos).map(Some)
    }

    /// Bytes at the front of the buffer already known to be well formed
    pub fn validated(&self) -> usize {
        self.pos
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.scan_from = 0;
        self.bulk_end = None;
        self.open_arrays.clear();
    }

    /// Validate from where the last call stopped
    ///
    /// Returns the length of the first value once its last byte has arrived.
    fn scan(&mut self, buf: &[u8]) -> std::result::Result<Option<usize>, DecodeError> {
        loop {
            if let Some(end) = self.bulk_end {
                if buf.len() < end {
                    return Ok(None);
                }
                if &buf[end - CRLF.len()..end] != CRLF {
                    return Err(DecodeError::Framing);
                }
                self.bulk_end = None;
                if self.finish_item(end) {
                    return Ok(Some(end));
                }
                continue;
            }

            let start = self.pos;
            let Some(&tag) = buf.get(start) else {
                return Ok(None);
            };

            match tag {
                SIMPLE_STRING_TAG | ERROR_TAG | INTEGER_TAG | BULK_STRING_TAG => {}
                ARRAY_TAG if self.open_arrays.len() >= MAX_NESTING_DEPTH => {
                    return Err(DecodeError::NestingTooDeep(MAX_NESTING_DEPTH));
                }
                ARRAY_TAG => {}
                other => return Err(DecodeError::UnsupportedType(other)),
            }

            let Some((line_end, next)) = find_line(buf, start + 1, self.scan_from)? else {
                self.scan_from = buf.len();
                return Ok(None);
            };
            let line = &buf[start + 1..line_end];

            match tag {
                INTEGER_TAG => {
                    parse_integer(line)?;
                }
                BULK_STRING_TAG => {
                    if let Some(len) = parse_length(line)? {
                        check_bulk_len(len)?;
                        self.pos = next;
                        self.scan_from = next;
                        self.bulk_end = Some(next + len + CRLF.len());
                        continue;
                    }
                }
                ARRAY_TAG => {
                    if let Some(len @ 1..) = parse_length(line)? {
                        self.open_arrays.push(len);
                        self.pos = next;
                        self.scan_from = next;
                        continue;
                    }
                }
                _ => {}
            }

            if self.finish_item(next) {
                return Ok(Some(next));
            }
        }
    }

    /// Record an item ending at `end`; true when that completes the outermost value
    fn finish_item(&mut self, end: usize) -> bool {
        self.pos = end;
        self.scan_from = end;

        while let Some(remaining) = self.open_arrays.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                return false;
            }
            self.open_arrays.pop();
        }
        true
    }
}

/// Build a value out of a frame the decoder has already validated
///
/// Payloads are slices of `frame`.
fn parse_value(frame: &Bytes, pos: &mut usize) -> std::result::Result<Value, DecodeError> {
    let start = *pos;
    let tag = *frame.get(start).ok_or(DecodeError::Incomplete)?;
    let (line_end, next) =
        find_line(frame, start + 1, start + 1)?.ok_or(DecodeError::Incomplete)?;
    let line = &frame[start + 1..line_end];
    *pos = next;

    match tag {
        SIMPLE_STRING_TAG => Ok(Value::SimpleString(frame.slice(start + 1..line_end))),
        ERROR_TAG => Ok(Value::Error(frame.slice(start + 1..line_end))),
        INTEGER_TAG => parse_integer(line).map(Value::Integer),
        BULK_STRING_TAG => {
            let Some(len) = parse_length(line)? else {
                return Ok(Value::BulkString(None));
            };
            let payload_end = next + len;
            let total_end = payload_end + CRLF.len();
            if frame.len() < total_end {
                return Err(DecodeError::Incomplete);
            }
            if &frame[payload_end..total_end] != CRLF {
                return Err(DecodeError::Framing);
            }
            *pos = total_end;
            Ok(Value::BulkString(Some(frame.slice(next..payload_end))))
        }
        ARRAY_TAG => {
            let Some(len) = parse_length(line)? else {
                return Ok(Value::Array(None));
            };
            let mut items = Vec::with_capacity(len.min(ARRAY_PREALLOC_LIMIT));
            for _ in 0..len {
                items.push(parse_value(frame, pos)?);
            }
            Ok(Value::Array(Some(items)))
        }
        other => Err(DecodeError::UnsupportedType(other)),
    }
}

/// Find the end of the CRLF-terminated line starting at `line_start`
///
/// The LF search begins at `scan_from` when that is further along. Returns the
/// end of the line content and the offset just past its terminator, or `None`
/// when no LF has arrived yet.
fn find_line(
    buf: &[u8],
    line_start: usize,
    scan_from: usize,
) -> std::result::Result<Option<(usize, usize)>, DecodeError> {
    let from = scan_from.max(line_start);
    let Some(offset) = buf
        .get(from..)
        .and_then(|rest| rest.iter().position(|&b| b == b'\n'))
    else {
        return Ok(None);
    };

    let lf = from + offset;
    if lf == line_start || buf[lf - 1] != b'\r' {
        return Err(DecodeError::Framing);
    }

    Ok(Some((lf - 1, lf + 1)))
}

fn check_bulk_len(len: usize) -> std::result::Result<(), DecodeError> {
    if len > MAX_BULK_LEN {
        return Err(DecodeError::FrameTooLarge {
            size: len,
            max: MAX_BULK_LEN,
        });
    }
    Ok(())
}

/// Parse a length field: plain decimal digits, or `-1` for null (`None`)
fn parse_length(line: &[u8]) -> std::result::Result<Option<usize>, DecodeError> {
    if line == b"-1" {
        return Ok(None);
    }

    let malformed = || DecodeError::MalformedLength(String::from_utf8_lossy(line).into_owned());
    if line.is_empty() || !line.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }

    std::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse().ok())
        .map(Some)
        .ok_or_else(malformed)
}

fn parse_integer(line: &[u8]) -> std::result::Result<i64, DecodeError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| DecodeError::MalformedInteger(String::from_utf8_lossy(line).into_owned()))
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value to bytes
pub fn encode(value: &Value) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_into(value, &mut buf);
    buf
}

/// Encode a value into an existing buffer
pub fn encode_into(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::SimpleString(content) | Value::Error(content) => {
            buf.extend_from_slice(&[value.tag()]);
            buf.extend_from_slice(content);
            buf.extend_from_slice(CRLF);
        }
        Value::Integer(n) => {
            buf.extend_from_slice(&[INTEGER_TAG]);
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.extend_from_slice(CRLF);
        }
        Value::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
        Value::BulkString(Some(content)) => {
            buf.extend_from_slice(&[BULK_STRING_TAG]);
            buf.extend_from_slice(content.len().to_string().as_bytes());
            buf.extend_from_slice(CRLF);
            buf.extend_from_slice(content);
            buf.extend_from_slice(CRLF);
        }
        Value::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
        Value::Array(Some(items)) => {
            buf.extend_from_slice(&[ARRAY_TAG]);
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(CRLF);
            for item in items {
                encode_into(item, buf);
            }
        }
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete value from a stream
///
/// Bytes that arrive after the value stay in `buffer` for the next call.
/// Blocks until a complete value is received or an error occurs.
pub fn read_value<R: Read>(reader: &mut R, buffer: &mut BytesMut) -> Result<Value> {
    let mut chunk = [0u8; STREAM_CHUNK_SIZE];
    let mut decoder = Decoder::new();

    loop {
        if let Some(value) = decoder.decode(buffer)? {
            return Ok(value);
        }

        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(KvError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed before a complete value arrived",
            )));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

/// Write a value to a stream
pub fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    let bytes = encode(value);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
