/*
 * mod.rs
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

//! Internet transport: the capability that performs socket, TLS and protocol I/O for the client.
//!
//! Three handle levels, each only valid while its parent is open:
//! - `Session`: one per client, opened with the user agent ("open" handle).
//! - `Connection`: one host:port for one protocol.
//! - `Exchange`: one in-flight HTTP request and its response ("request" handle).
//!
//! FTP transfers run to completion inside `Connection::retrieve`/`Connection::store` and need
//! no exchange. All calls block the calling thread.
//!
//! Implementations: `net::NetTransport` (tokio + rustls) and `memory::MemoryTransport`.

pub mod handles;
pub mod memory;
pub mod net;

use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use crate::error::{Result, WebError};
use crate::uri::Scheme;

pub use handles::HandleSet;
pub use memory::MemoryTransport;
pub use net::NetTransport;

/// FTP transfer representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// TYPE A.
    Ascii,
    /// TYPE I.
    Binary,
}

impl TransferMode {
    pub fn from_ascii_flag(ascii: bool) -> Self {
        if ascii {
            TransferMode::Ascii
        } else {
            TransferMode::Binary
        }
    }
}

/// Status notifications a transport reports to the session's listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Connected,
    /// A request's response head has arrived, or an FTP transfer finished.
    RequestComplete,
    /// The operation failed; the error itself is returned to the caller.
    RequestFailed,
    Closed,
}

/// Called by the transport, possibly from a thread the transport owns.
pub type StatusListener = Arc<dyn Fn(TransportStatus) + Send + Sync>;

/// A session's listener, shared with every connection opened from it so that installing or
/// removing the listener later reaches connections that already exist.
#[derive(Clone, Default)]
pub(crate) struct ListenerSlot(Arc<Mutex<Option<StatusListener>>>);

impl ListenerSlot {
    pub(crate) fn set(&self, listener: Option<StatusListener>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = listener;
    }

    /// Call the current listener, if any, outside the lock.
    pub(crate) fn notify(&self, status: TransportStatus) {
        let listener = self.0.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(listener) = listener {
            listener(status);
        }
    }
}

/// Where `Session::connect` should connect.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Method, path and caller headers of an HTTP request. The transport adds Host, User-Agent,
/// Content-Length and connection management headers itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: &'static str,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn new(method: &'static str, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `InvalidHeader` when the path or any header would change the framing of the request.
    pub fn validate(&self) -> Result<()> {
        check_line_field("request path", &self.path)?;
        if self.path.is_empty() || self.path.contains(&[' ', '\t'][..]) {
            return Err(WebError::InvalidHeader(format!("request path {:?}", self.path)));
        }
        for (name, value) in &self.headers {
            if !is_token(name) {
                return Err(WebError::InvalidHeader(format!("header name {:?}", name)));
            }
            check_line_field(&format!("{} header value", name), value)?;
        }
        Ok(())
    }
}

/// RFC 9110 token, the syntax of a header name.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// `InvalidHeader` naming `what` when `value` holds CR, LF or NUL. Applies to anything written
/// as part of a CRLF-terminated line: header values, request paths, FTP command arguments.
pub fn check_line_field(what: &str, value: &str) -> Result<()> {
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(WebError::InvalidHeader(what.to_string()));
    }
    Ok(())
}

/// A request body whose length is known before it is written.
pub trait RequestBody: Send + Sync {
    fn content_length(&self) -> u64;

    /// Write the body; returns the bytes written, which must equal `content_length`.
    fn write_to(&self, out: &mut dyn Write) -> Result<u64>;
}

/// Factory for sessions.
pub trait Transport: Send + Sync {
    /// Open a session for `agent` (the User-Agent of every request on it).
    fn open(&self, agent: &str) -> Result<Box<dyn Session>>;
}

pub trait Session: Send {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Connection>>;

    /// Install (or with None remove) the status listener for this session.
    fn set_status_listener(&mut self, listener: Option<StatusListener>);

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub trait Connection: Send {
    /// Send an HTTP request. On success the response head has been received.
    fn send(&mut self, head: &RequestHead, body: Option<&dyn RequestBody>) -> Result<Box<dyn Exchange>>;

    /// Download `path` into `sink`. Returns the bytes transferred.
    fn retrieve(&mut self, path: &str, mode: TransferMode, sink: &mut dyn Write) -> Result<u64>;

    /// Upload `source` to `path`. Returns the bytes transferred.
    fn store(&mut self, path: &str, mode: TransferMode, source: &mut dyn Read) -> Result<u64>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Response side of one HTTP request.
pub trait Exchange: Send {
    fn status(&self) -> u16;

    /// Headers in arrival order.
    fn headers(&self) -> &[(String, String)];

    /// Status line and headers exactly as received, including the terminating blank line.
    fn raw_header(&self) -> &[u8];

    /// Read body bytes. Ok(0) only at end of body.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Rebuild a raw header block from parsed parts, for transports that never see the wire.
pub fn format_raw_header(status: u16, reason: &str, headers: &[(String, String)]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", status, reason);
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_debug_hides_password() {
        let ep = Endpoint {
            scheme: Scheme::Ftp,
            host: "h".into(),
            port: 21,
            user: Some("u".into()),
            password: Some("secret".into()),
        };
        let s = format!("{:?}", ep);
        assert!(!s.contains("secret"));
        assert!(s.contains("***"));
    }

    #[test]
    fn request_head_lookup_is_case_insensitive() {
        let mut head = RequestHead::new("GET", "/");
        head.header("Content-Type", "text/plain");
        assert_eq!(head.get("content-type"), Some("text/plain"));
        assert_eq!(head.get("cookie"), None);
    }

    #[test]
    fn line_breaks_in_headers_and_path_are_rejected() {
        let mut head = RequestHead::new("GET", "/ok?a=b");
        head.header("Cookie", "a=1; b=2");
        head.validate().unwrap();

        head.header("Cookie", "a=1\r\nX-Injected: yes");
        let err = head.validate().unwrap_err();
        assert!(matches!(err, WebError::InvalidHeader(ref what) if what == "Cookie header value"));

        let mut head = RequestHead::new("GET", "/ok");
        head.header("X-Bad\nName", "v");
        assert!(matches!(head.validate(), Err(WebError::InvalidHeader(_))));

        for path in ["/a\r\nHost: evil", "/a b", "/nul\0", ""] {
            assert!(RequestHead::new("GET", path).validate().is_err(), "{:?}", path);
        }
        assert!(check_line_field("FTP path", "/f\r\nDELE x").is_err());
        assert!(check_line_field("FTP path", "/pub/file name.txt").is_ok());
    }

    #[test]
    fn raw_header_format() {
        let raw = format_raw_header(200, "OK", &[("A".into(), "1".into())]);
        assert_eq!(raw, b"HTTP/1.1 200 OK\r\nA: 1\r\n\r\n");
    }
}
