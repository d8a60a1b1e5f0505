/*
 * multipart.rs
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

//! multipart/form-data encoder.
//!
//! Each argument becomes one `Part`: a framing head (boundary line, Content-Disposition,
//! Content-Type for files, blank line), a payload and a trailing CRLF. The body ends with
//! `--<boundary>--\r\n`. `total_length` and `write` walk the same `Part` list, so the
//! declared Content-Length and the streamed body agree by construction. File payloads are
//! measured from metadata when the encoder is built and streamed in chunks when written; a
//! file whose size changes in between is reported as an error.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::content_type::ContentTypeResolver;
use crate::error::{Result, WebError};
use crate::form::{Argument, ArgumentList};
use crate::transport::RequestBody;

const CRLF: &[u8] = b"\r\n";

/// Quote a header parameter value: escape backslash and double quote, drop line breaks.
fn quote_param(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(&['\r', '\n'][..], " ")
}

#[derive(Debug, Clone)]
enum Payload {
    Inline(Vec<u8>),
    File { path: PathBuf, len: u64 },
}

/// One encoded section of the body.
#[derive(Debug, Clone)]
pub(crate) struct Part {
    head: String,
    payload: Payload,
}

impl Part {
    pub(crate) fn from_argument(
        argument: &Argument,
        boundary: &str,
        resolver: &dyn ContentTypeResolver,
    ) -> Result<Self> {
        let mut head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"",
            boundary,
            quote_param(&argument.name)
        );
        let payload = if argument.is_file {
            let path = PathBuf::from(&argument.value);
            let meta = std::fs::metadata(&path).map_err(|e| WebError::Attachment {
                path: path.clone(),
                source: e,
            })?;
            if !meta.is_file() {
                return Err(WebError::Attachment {
                    path,
                    source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
                });
            }
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            head.push_str("; filename=\"");
            head.push_str(&quote_param(&filename));
            head.push_str("\"\r\nContent-Type: ");
            head.push_str(&argument.content_type(resolver));
            Payload::File {
                path,
                len: meta.len(),
            }
        } else {
            Payload::Inline(argument.value.as_bytes().to_vec())
        };
        head.push_str("\r\n\r\n");
        Ok(Self { head, payload })
    }

    fn payload_length(&self) -> u64 {
        match &self.payload {
            Payload::Inline(data) => data.len() as u64,
            Payload::File { len, .. } => *len,
        }
    }

    pub(crate) fn encoded_length(&self) -> u64 {
        self.head.len() as u64 + self.payload_length() + CRLF.len() as u64
    }

    pub(crate) fn write_to(&self, out: &mut dyn Write, chunk_size: usize) -> Result<u64> {
        out.write_all(self.head.as_bytes())?;
        let payload = match &self.payload {
            Payload::Inline(data) => {
                out.write_all(data)?;
                data.len() as u64
            }
            Payload::File { path, len } => stream_file(path, *len, out, chunk_size)?,
        };
        out.write_all(CRLF)?;
        Ok(self.head.len() as u64 + payload + CRLF.len() as u64)
    }
}

/// Copy exactly `len` bytes of `path` to `out`, `chunk_size` bytes at a time.
fn stream_file(path: &Path, len: u64, out: &mut dyn Write, chunk_size: usize) -> Result<u64> {
    let attachment_err = |source: io::Error| WebError::Attachment {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(attachment_err)?;
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut written = 0u64;
    while written < len {
        let want = (len - written).min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want]).map_err(attachment_err)?;
        if n == 0 {
            return Err(attachment_err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank to {} bytes while uploading, expected {}", written, len),
            )));
        }
        out.write_all(&buf[..n])?;
        written += n as u64;
    }
    let mut extra = [0u8; 1];
    if file.read(&mut extra).map_err(attachment_err)? != 0 {
        return Err(attachment_err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("file grew past {} bytes while uploading", len),
        )));
    }
    Ok(written)
}

/// multipart/form-data body for an argument list.
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
    parts: Vec<Part>,
    chunk_size: usize,
}

impl MultipartEncoder {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    /// Measure every argument. Fails if a file argument cannot be stat'ed.
    pub fn new(
        arguments: &ArgumentList,
        boundary: impl Into<String>,
        resolver: &dyn ContentTypeResolver,
    ) -> Result<Self> {
        let boundary = boundary.into();
        let parts = arguments
            .iter()
            .map(|a| Part::from_argument(a, &boundary, resolver))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            boundary,
            parts,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's Content-Type header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn closing(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }

    pub fn total_length(&self) -> u64 {
        let parts: u64 = self.parts.iter().map(Part::encoded_length).sum();
        parts + self.closing().len() as u64
    }

    /// Stream the body to `out`. Returns the number of bytes written.
    pub fn write(&self, out: &mut dyn Write) -> Result<u64> {
        let mut written = 0u64;
        for part in &self.parts {
            written += part.write_to(out, self.chunk_size)?;
        }
        let closing = self.closing();
        out.write_all(closing.as_bytes())?;
        written += closing.len() as u64;
        Ok(written)
    }
}

impl RequestBody for MultipartEncoder {
    fn content_length(&self) -> u64 {
        self.total_length()
    }

    fn write_to(&self, out: &mut dyn Write) -> Result<u64> {
        self.write(out)
    }
}
