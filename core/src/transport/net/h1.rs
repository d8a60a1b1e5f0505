/*
 * h1.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Webclient, an HTTP and FTP client library.
 *
 * Webclient is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Webclient is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Webclient.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP/1.1 response push parser: status line, headers, then a body delimited by
//! Content-Length, chunked coding, or connection close.

use bytes::{Buf, BytesMut};
use std::io;

/// Events from `ResponseParser::receive`.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: &str);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Head parsed; the owner must call `set_body_mode`.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
    Done,
}

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

impl BodyMode {
    /// Body framing for a response with `status` and `headers` (RFC 9112 §6.3, HEAD excluded).
    pub fn for_response(status: u16, headers: &[(String, String)]) -> BodyMode {
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return BodyMode::Empty;
        }
        let chunked = headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked")
        });
        if chunked {
            return BodyMode::Chunked;
        }
        let length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<u64>().ok());
        match length {
            Some(0) => BodyMode::Empty,
            Some(n) => BodyMode::Length(n),
            None => BodyMode::UntilClose,
        }
    }
}

/// Status line plus headers of one response.
pub const MAX_HEAD: usize = 64 * 1024;
/// Chunk-size and trailer lines.
const MAX_LINE: usize = 8 * 1024;

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

pub struct ResponseParser {
    state: ParseState,
    remaining: u64,
    raw_head: Vec<u8>,
    /// Bytes at the front of the buffer already searched for CRLF.
    scanned: usize,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            remaining: 0,
            raw_head: Vec::new(),
            scanned: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Start over for the next response head (after an interim 1xx response).
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.remaining = 0;
        self.raw_head.clear();
        self.scanned = 0;
    }

    /// Status line and headers as received, blank line included.
    pub fn raw_head(&self) -> &[u8] {
        &self.raw_head
    }

    /// Take one CRLF-terminated line off `buf`, or None if it is not complete yet. A line
    /// (terminator included) longer than `limit` is an error, found or not.
    fn take_line(&mut self, buf: &mut BytesMut, limit: usize) -> io::Result<Option<BytesMut>> {
        let from = self.scanned.saturating_sub(1).min(buf.len());
        match buf[from..].windows(2).position(|w| w == b"\r\n") {
            Some(i) => {
                let end = from + i;
                self.scanned = 0;
                if end + 2 > limit {
                    return Err(invalid("response line too long"));
                }
                let mut line = buf.split_to(end + 2);
                line.truncate(end);
                Ok(Some(line))
            }
            None if buf.len() > limit => Err(invalid("response line too long")),
            None => {
                self.scanned = buf.len();
                Ok(None)
            }
        }
    }

    fn head_room(&self) -> usize {
        MAX_HEAD.saturating_sub(self.raw_head.len())
    }

    /// Consume as much of `buf` as can be parsed. Incomplete input stays in `buf`.
    pub fn receive<H: H1ResponseHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> io::Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let room = self.head_room();
                    let Some(line) = self.take_line(buf, room)? else { return Ok(()) };
                    self.raw_head.extend_from_slice(&line);
                    self.raw_head.extend_from_slice(b"\r\n");
                    let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid status line"))?;
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(invalid("not an HTTP response"));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| invalid("invalid status code"))?;
                    handler.status(code, parts.next().unwrap_or(""));
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let room = self.head_room();
                    let Some(line) = self.take_line(buf, room)? else { return Ok(()) };
                    self.raw_head.extend_from_slice(&line);
                    self.raw_head.extend_from_slice(b"\r\n");
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid header"))?;
                    if let Some(colon) = line.find(':') {
                        handler.header(line[..colon].trim(), line[colon + 1..].trim());
                    }
                }
                ParseState::HeadersComplete | ParseState::Done => return Ok(()),
                ParseState::Body => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = (buf.len() as u64).min(self.remaining) as usize;
                    handler.body_chunk(&buf.split_to(n));
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.finish(handler);
                    }
                }
                ParseState::ChunkSize => {
                    let Some(line) = self.take_line(buf, MAX_LINE)? else { return Ok(()) };
                    let line = std::str::from_utf8(&line).map_err(|_| invalid("invalid chunk size"))?;
                    let hex = line.split(';').next().unwrap_or("").trim();
                    self.remaining = u64::from_str_radix(hex, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = (buf.len() as u64).min(self.remaining) as usize;
                    handler.body_chunk(&buf.split_to(n));
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = self.take_line(buf, MAX_LINE)? else { return Ok(()) };
                    if line.is_empty() {
                        self.finish(handler);
                    }
                }
            }
        }
    }

    /// Called once in `HeadersComplete` to choose how the body is read.
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        match mode {
            BodyMode::Empty => self.finish(handler),
            BodyMode::Length(n) => {
                self.remaining = n;
                self.state = ParseState::Body;
            }
            BodyMode::Chunked => self.state = ParseState::ChunkSize,
            BodyMode::UntilClose => {
                self.remaining = u64::MAX;
                self.state = ParseState::Body;
            }
        }
    }

    /// The peer closed the connection. Completes a read-until-close body; anything else that
    /// was still expecting bytes is a truncated response.
    pub fn eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::Done => Ok(()),
            ParseState::Body if self.remaining == u64::MAX => {
                self.finish(handler);
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before end of response",
            )),
        }
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        self.state = ParseState::Done;
        handler.complete();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
