/*
 * http.rs
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

//! HTTP/1.1 over plain TCP or TLS. Each request opens its own stream and sends
//! `Connection: close`; the response body is read until the framing says it is done.

use std::io::{self, BufWriter, Write};
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::{Result, WebError};
use crate::transport::net::h1::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::transport::net::{connect_any, tls, NetContext};
use crate::transport::{
    check_line_field, Connection, Endpoint, Exchange, RequestBody, RequestHead, TransferMode,
};
use crate::uri::Scheme;

const READ_CHUNK: usize = 8192;
const WRITE_BUFFER: usize = 16 * 1024;
const MAX_INTERIM_RESPONSES: usize = 16;

/// Plain TCP or TLS.
pub(crate) enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(&mut **s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(&mut **s).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(&mut **s).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(&mut **s).poll_shutdown(cx),
        }
    }
}

/// Host header value: IPv6 literals bracketed, port only when not the scheme default.
fn host_header(endpoint: &Endpoint) -> String {
    let host = if endpoint.host.contains(':') {
        format!("[{}]", endpoint.host)
    } else {
        endpoint.host.clone()
    };
    if endpoint.port == endpoint.scheme.default_port() {
        host
    } else {
        format!("{}:{}", host, endpoint.port)
    }
}

/// Serialize the request head. Caller headers follow the ones the transport owns. Fails with
/// `InvalidHeader` before anything is written when a field would break the framing.
pub(crate) fn format_request_head(
    head: &RequestHead,
    endpoint: &Endpoint,
    agent: &str,
    content_length: Option<u64>,
) -> Result<String> {
    head.validate()?;
    check_line_field("User-Agent", agent)?;
    let mut out = format!("{} {} HTTP/1.1\r\n", head.method, head.path);
    out.push_str(&format!("Host: {}\r\n", host_header(endpoint)));
    out.push_str(&format!("User-Agent: {}\r\n", agent));
    if let Some(ref user) = endpoint.user {
        let credentials = format!("{}:{}", user, endpoint.password.as_deref().unwrap_or(""));
        out.push_str(&format!("Authorization: Basic {}\r\n", BASE64.encode(credentials)));
    }
    if let Some(n) = content_length {
        out.push_str(&format!("Content-Length: {}\r\n", n));
    }
    out.push_str("Connection: close\r\n");
    for (name, value) in &head.headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    Ok(out)
}

fn into_io(e: WebError) -> io::Error {
    match e {
        WebError::Transport(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

/// Parser errors: a response that breaks HTTP/1.1 framing is a protocol error.
fn malformed(e: io::Error) -> WebError {
    if e.kind() == io::ErrorKind::InvalidData {
        WebError::protocol(e.to_string())
    } else {
        e.into()
    }
}

/// Blocking `Write` over the async stream, for `RequestBody::write_to`.
struct BlockingWriter<'a> {
    context: &'a NetContext,
    stream: &'a mut HttpStream,
}

impl Write for BlockingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stream = &mut *self.stream;
        self.context
            .run(async move { stream.write_all(buf).await })
            .map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let stream = &mut *self.stream;
        self.context
            .run(async move { stream.flush().await })
            .map_err(into_io)
    }
}

/// Head fields collected while the status line and headers are parsed.
#[derive(Default)]
struct HeadCollector {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
}

impl H1ResponseHandler for HeadCollector {
    fn status(&mut self, code: u16, reason: &str) {
        self.status = code;
        self.reason = reason.to_string();
        self.headers.clear();
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, _data: &[u8]) {}

    fn complete(&mut self) {}
}

/// Decoded body bytes waiting for the caller.
struct BodySink<'a> {
    pending: &'a mut BytesMut,
}

impl H1ResponseHandler for BodySink<'_> {
    fn status(&mut self, _code: u16, _reason: &str) {}

    fn header(&mut self, _name: &str, _value: &str) {}

    fn body_chunk(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    fn complete(&mut self) {}
}

/// Read more bytes into `buf`. A TLS peer that closes without close_notify counts as EOF.
async fn fill(stream: &mut HttpStream, buf: &mut BytesMut) -> io::Result<usize> {
    let mut tmp = [0u8; READ_CHUNK];
    match stream.read(&mut tmp).await {
        Ok(n) => {
            buf.extend_from_slice(&tmp[..n]);
            Ok(n)
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
        Err(e) => Err(e),
    }
}

pub(crate) struct HttpConnection {
    context: NetContext,
    endpoint: Endpoint,
    addrs: Vec<SocketAddr>,
}

impl HttpConnection {
    pub(crate) fn new(context: NetContext, endpoint: Endpoint, addrs: Vec<SocketAddr>) -> Self {
        Self {
            context,
            endpoint,
            addrs,
        }
    }

    fn open_stream(&self) -> Result<HttpStream> {
        let addrs = &self.addrs;
        let limit = self.context.connect_timeout;
        let host = self.endpoint.host.as_str();
        let secure = self.endpoint.scheme.is_secure();
        self.context.run(async move {
            let tcp = connect_any(addrs, limit).await?;
            if secure {
                Ok(HttpStream::Tls(Box::new(tls::handshake(host, tcp).await?)))
            } else {
                Ok(HttpStream::Plain(tcp))
            }
        })
    }

    fn exchange(&mut self, head: &RequestHead, body: Option<&dyn RequestBody>) -> Result<NetExchange> {
        let mut stream = self.open_stream()?;
        let content_length = body.map(|b| b.content_length());
        let request = format_request_head(head, &self.endpoint, &self.context.agent, content_length)?;
        debug!("{} {}{}", head.method, host_header(&self.endpoint), head.path);

        {
            let mut out = BufWriter::with_capacity(
                WRITE_BUFFER,
                BlockingWriter {
                    context: &self.context,
                    stream: &mut stream,
                },
            );
            out.write_all(request.as_bytes())?;
            if let Some(body) = body {
                let declared = body.content_length();
                let written = body.write_to(&mut out)?;
                if written != declared {
                    return Err(WebError::LengthMismatch { declared, written });
                }
            }
            out.flush()?;
        }

        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let mut head_fields = HeadCollector::default();
        let mut interim = 0;
        loop {
            if parser.state() != ParseState::HeadersComplete {
                let stream_ref = &mut stream;
                let buf_ref = &mut buf;
                let n = self.context.run(async move { fill(stream_ref, buf_ref).await })?;
                if n == 0 {
                    return Err(WebError::protocol("connection closed before response head"));
                }
                parser.receive(&mut buf, &mut head_fields).map_err(malformed)?;
                continue;
            }
            // 100 Continue and other interim responses precede the real one.
            if (100..200).contains(&head_fields.status) && head_fields.status != 101 {
                interim += 1;
                if interim > MAX_INTERIM_RESPONSES {
                    return Err(WebError::protocol("too many interim responses"));
                }
                parser.reset();
                head_fields = HeadCollector::default();
                parser.receive(&mut buf, &mut head_fields).map_err(malformed)?;
                continue;
            }
            break;
        }

        let mode = BodyMode::for_response(head_fields.status, &head_fields.headers);
        debug!("{} {} ({:?})", head_fields.status, head_fields.reason, mode);
        let mut pending = BytesMut::new();
        let mut sink = BodySink { pending: &mut pending };
        parser.set_body_mode(mode, &mut sink);
        parser.receive(&mut buf, &mut sink).map_err(malformed)?;
        let raw = parser.raw_head().to_vec();

        Ok(NetExchange {
            context: self.context.clone(),
            stream: Some(stream),
            parser,
            buf,
            pending,
            status: head_fields.status,
            headers: head_fields.headers,
            raw,
        })
    }
}

impl Connection for HttpConnection {
    fn send(&mut self, head: &RequestHead, body: Option<&dyn RequestBody>) -> Result<Box<dyn Exchange>> {
        let result = self.exchange(head, body);
        let exchange = self.context.report(result)?;
        Ok(Box::new(exchange))
    }

    fn retrieve(&mut self, _path: &str, _mode: TransferMode, _sink: &mut dyn Write) -> Result<u64> {
        Err(WebError::WrongProtocol {
            expected: Scheme::Ftp.as_str(),
            actual: self.endpoint.scheme,
        })
    }

    fn store(&mut self, _path: &str, _mode: TransferMode, _source: &mut dyn io::Read) -> Result<u64> {
        Err(WebError::WrongProtocol {
            expected: Scheme::Ftp.as_str(),
            actual: self.endpoint.scheme,
        })
    }
}

pub(crate) struct NetExchange {
    context: NetContext,
    stream: Option<HttpStream>,
    parser: ResponseParser,
    buf: BytesMut,
    pending: BytesMut,
    status: u16,
    headers: Vec<(String, String)>,
    raw: Vec<u8>,
}

impl NetExchange {
    fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _guard = self.context.enter();
            drop(stream);
        }
    }
}

impl Exchange for NetExchange {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn raw_header(&self) -> &[u8] {
        &self.raw
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            if !self.pending.is_empty() {
                let n = out.len().min(self.pending.len());
                out[..n].copy_from_slice(&self.pending.split_to(n));
                return Ok(n);
            }
            if self.parser.state() == ParseState::Done {
                self.release_stream();
                return Ok(0);
            }
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| WebError::protocol("response stream already closed"))?;
            let buf = &mut self.buf;
            let n = self.context.run(async move { fill(stream, buf).await })?;
            let mut sink = BodySink {
                pending: &mut self.pending,
            };
            if n == 0 {
                self.parser.eof(&mut sink).map_err(malformed)?;
            } else {
                self.parser.receive(&mut self.buf, &mut sink).map_err(malformed)?;
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.release_stream();
        Ok(())
    }
}

impl Drop for NetExchange {
    fn drop(&mut self) {
        self.release_stream();
    }
}
