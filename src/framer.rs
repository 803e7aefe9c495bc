//! Line framing
//!
//! Turns a connection's byte stream into complete protocol lines and
//! terminates outbound lines with CRLF. Partial reads stay buffered in the
//! `BytesMut` owned by `FramedRead` until a terminator arrives, so one
//! read may yield zero, one or many lines.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::FrameError;

/// Longest outbound line body; CRLF brings it to 512 bytes
pub const MAX_OUTBOUND_LEN: usize = 510;

/// CRLF line codec with a maximum inbound line length
///
/// Accepts `\r\n` and bare `\n` as terminators. A line longer than
/// `max_len` (terminator included) is a `FrameError::LineTooLong`, which
/// ends the connection.
#[derive(Debug, Clone)]
pub struct LineFramer {
    /// Index of the next byte to scan for `\n`
    next_index: usize,
    max_len: usize,
}

impl LineFramer {
    pub fn new(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Decoder for LineFramer {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                // Only the unscanned tail is searched next time
                self.next_index = src.len();
                if src.len() > self.max_len {
                    return Err(FrameError::LineTooLong {
                        actual: src.len(),
                        limit: self.max_len,
                    });
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(FrameError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let mut body = &line[..line.len() - 1];
            if let Some(stripped) = body.strip_suffix(b"\r") {
                body = stripped;
            }

            // Blank lines carry no command
            if body.is_empty() {
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(body).into_owned()));
        }
    }

    /// Complete lines are still delivered; an unterminated tail is discarded
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            trace!("Dropping {} unterminated bytes at EOF", src.len());
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl Encoder<String> for LineFramer {
    type Error = FrameError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), FrameError> {
        let body = truncate_at_boundary(&line, MAX_OUTBOUND_LEN);
        dst.reserve(body.len() + 2);
        dst.put_slice(body.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn truncate_at_boundary(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
