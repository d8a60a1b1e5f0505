/*
 * error.rs
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

//! Client and transport errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::uri::Scheme;

/// Errors from the client, the encoders, or a transport.
#[derive(Debug, Error)]
pub enum WebError {
    /// The URL could not be decomposed into scheme, host, port and path.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// `connect` was called while a connection is already open. Call `close` first.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The operation needs an open connection.
    #[error("client is not connected")]
    NotConnected,

    /// No response is available (no successful request yet, or the client was closed).
    #[error("no response available")]
    NoResponse,

    /// A new request was issued before the previous response body was read to the end.
    #[error("previous response body has not been fully read")]
    ResponsePending,

    /// The operation is not valid for the protocol of the current connection.
    #[error("operation requires {expected} but the connection uses {actual}")]
    WrongProtocol { expected: &'static str, actual: Scheme },

    /// A file argument could not be measured or read.
    #[error("cannot attach {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A header name or value, request path, FTP argument or boundary tag holds bytes that
    /// would break the message framing (CR, LF, NUL, or characters the field disallows).
    #[error("invalid {0}")]
    InvalidHeader(String),

    /// A request body wrote a different number of bytes than it declared.
    #[error("body length mismatch: declared {declared} bytes, wrote {written}")]
    LengthMismatch { declared: u64, written: u64 },

    /// The server violated the protocol (bad status line, unexpected FTP reply, ...).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport failure: DNS, connect, TLS, read or write.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl WebError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// True for failures of the network or the peer, as opposed to misuse of the client.
    pub fn is_transport(&self) -> bool {
        matches!(self, WebError::Transport(_) | WebError::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_message_names_path() {
        let err = WebError::Attachment {
            path: PathBuf::from("/tmp/missing.bin"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.bin"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn invalid_header_is_not_a_transport_error() {
        let err = WebError::InvalidHeader("Cookie value".into());
        assert_eq!(err.to_string(), "invalid Cookie value");
        assert!(!err.is_transport());
    }

    #[test]
    fn io_errors_are_transport_errors() {
        let err: WebError = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(err.is_transport());
        assert!(!WebError::NotConnected.is_transport());
    }
}
