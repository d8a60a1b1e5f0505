/*
 * ftp.rs
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

//! FTP client: one control connection per `Connection`, a passive-mode data connection per
//! transfer.
//!
//! ASCII transfers convert line ends: CRLF on the wire, LF locally (no conversion on Windows).
//! Upload turns bare LF into CRLF and leaves existing CRLF alone; download turns every CRLF
//! into LF. A local file that already uses CRLF therefore comes back with LF line ends; use
//! binary mode when the bytes must survive unchanged. Byte counts returned by
//! `retrieve`/`store` are local bytes.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Result, WebError};
use crate::transport::net::{connect_any, NetContext};
use crate::transport::{
    check_line_field, Connection, Endpoint, Exchange, RequestBody, RequestHead, TransferMode,
};
use crate::uri::Scheme;

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";
const DATA_CHUNK: usize = 64 * 1024;
const MAX_REPLY_LINE: u64 = 8 * 1024;
const MAX_REPLY_LINES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Text of every line, code prefixes removed, joined by '\n'.
    pub text: String,
}

impl Reply {
    fn expect(self, codes: &[u16]) -> Result<Reply> {
        if codes.contains(&self.code) {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    fn into_error(self) -> WebError {
        WebError::protocol(format!("{} {}", self.code, self.text))
    }
}

fn bad_reply(line: &str) -> WebError {
    WebError::protocol(format!("malformed FTP reply: {:?}", line))
}

/// Split a reply line into code, continuation flag and text.
pub fn parse_reply_line(line: &str) -> Option<(u16, bool, &str)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code: u16 = line[..3].parse().ok()?;
    if !(100..600).contains(&code) {
        return None;
    }
    match bytes.get(3) {
        None => Some((code, false, "")),
        Some(b' ') => Some((code, false, &line[4..])),
        Some(b'-') => Some((code, true, &line[4..])),
        Some(_) => None,
    }
}

/// Data address from a 227 reply text such as `Entering Passive Mode (h1,h2,h3,h4,p1,p2)`.
pub fn parse_pasv(text: &str) -> Option<SocketAddr> {
    let start = text.find('(')?;
    let end = start + text[start..].find(')')?;
    let fields: Vec<u8> = text[start + 1..end]
        .split(',')
        .map(|f| f.trim().parse::<u8>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if fields.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = (u16::from(fields[4]) << 8) | u16::from(fields[5]);
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Data port from a 229 reply text such as `Entering Extended Passive Mode (|||6446|)`.
pub fn parse_epsv(text: &str) -> Option<u16> {
    let start = text.find('(')?;
    let end = start + text[start..].find(')')?;
    let inner = &text[start + 1..end];
    let delim = inner.chars().next()?;
    inner.split(delim).nth(3)?.parse().ok()
}

/// CRLF to LF, carrying a trailing CR across chunks.
#[derive(Default)]
struct LineEndDecoder {
    cr: bool,
}

impl LineEndDecoder {
    fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if self.cr {
                self.cr = false;
                if b != b'\n' {
                    out.push(b'\r');
                }
            }
            if b == b'\r' {
                self.cr = true;
            } else {
                out.push(b);
            }
        }
    }

    fn finish(&mut self, out: &mut Vec<u8>) {
        if self.cr {
            self.cr = false;
            out.push(b'\r');
        }
    }
}

/// Bare LF to CRLF; existing CRLF pairs pass through.
#[derive(Default)]
struct LineEndEncoder {
    last_cr: bool,
}

impl LineEndEncoder {
    fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if b == b'\n' && !self.last_cr {
                out.push(b'\r');
            }
            out.push(b);
            self.last_cr = b == b'\r';
        }
    }
}

fn converts_line_ends(mode: TransferMode) -> bool {
    mode == TransferMode::Ascii && !cfg!(windows)
}

struct Control {
    stream: BufReader<TcpStream>,
}

impl Control {
    async fn read_reply(&mut self) -> Result<Reply> {
        let first = self.read_line().await?;
        let (code, mut more, text) = parse_reply_line(&first).ok_or_else(|| bad_reply(&first))?;
        let mut lines = vec![text.to_string()];
        while more {
            if lines.len() >= MAX_REPLY_LINES {
                return Err(WebError::protocol("FTP reply too long"));
            }
            let line = self.read_line().await?;
            match parse_reply_line(&line) {
                Some((c, false, text)) if c == code => {
                    lines.push(text.to_string());
                    more = false;
                }
                _ => lines.push(line.trim_start().to_string()),
            }
        }
        let reply = Reply {
            code,
            text: lines.join("\n"),
        };
        debug!("ftp< {} {}", reply.code, reply.text);
        Ok(reply)
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = (&mut self.stream).take(MAX_REPLY_LINE).read_line(&mut line).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "FTP control connection closed").into());
        }
        if !line.ends_with('\n') && n as u64 >= MAX_REPLY_LINE {
            return Err(WebError::protocol("FTP reply line too long"));
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    /// Read the reply that ends a transfer. After a local failure (`copied` is Err) the data
    /// connection is already gone; the server's 226/426 is read and discarded so the next
    /// command starts in step, and the local error is returned.
    async fn finish_transfer(&mut self, copied: io::Result<u64>, limit: std::time::Duration) -> Result<u64> {
        match copied {
            Ok(total) => {
                self.read_reply().await?.expect(&[226, 250])?;
                Ok(total)
            }
            Err(e) => {
                match timeout(limit, self.read_reply()).await {
                    Ok(Ok(reply)) => debug!("transfer abandoned, server said {} {}", reply.code, reply.text),
                    Ok(Err(read_err)) => warn!("no reply after abandoned transfer: {}", read_err),
                    Err(_) => warn!("timed out waiting for reply after abandoned transfer"),
                }
                Err(e.into())
            }
        }
    }

    async fn command(&mut self, command: &str) -> Result<Reply> {
        if command.starts_with("PASS ") {
            debug!("ftp> PASS ***");
        } else {
            debug!("ftp> {}", command);
        }
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        self.read_reply().await
    }

    /// Enter passive mode and return the data address. The host is always the control peer.
    async fn passive(&mut self) -> Result<SocketAddr> {
        let peer = self.stream.get_ref().peer_addr()?;
        if peer.is_ipv4() {
            let reply = self.command("PASV").await?;
            if reply.code == 227 {
                let addr = parse_pasv(&reply.text)
                    .ok_or_else(|| WebError::protocol(format!("227 {}", reply.text)))?;
                return Ok(SocketAddr::new(peer.ip(), addr.port()));
            }
        }
        let reply = self.command("EPSV").await?.expect(&[229])?;
        let port = parse_epsv(&reply.text).ok_or_else(|| WebError::protocol(format!("229 {}", reply.text)))?;
        Ok(SocketAddr::new(peer.ip(), port))
    }

    /// TYPE, passive data connection, then the transfer command.
    async fn open_data(&mut self, mode: TransferMode, command: &str, limit: std::time::Duration) -> Result<TcpStream> {
        let kind = match mode {
            TransferMode::Ascii => "TYPE A",
            TransferMode::Binary => "TYPE I",
        };
        self.command(kind).await?.expect(&[200])?;
        let addr = self.passive().await?;
        let data = connect_any(&[addr], limit).await?;
        self.command(command).await?.expect(&[125, 150])?;
        Ok(data)
    }
}

pub(crate) struct FtpConnection {
    context: NetContext,
    control: Option<Control>,
    scheme: Scheme,
}

impl FtpConnection {
    /// Connect the control channel and log in, anonymously when the endpoint has no user.
    pub(crate) fn login(context: NetContext, endpoint: &Endpoint, addrs: &[SocketAddr]) -> Result<Self> {
        let user = endpoint.user.clone().unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let password = match endpoint.password {
            Some(ref p) => p.clone(),
            None if endpoint.user.is_none() => ANONYMOUS_PASSWORD.to_string(),
            None => String::new(),
        };
        check_line_field("FTP user", &user)?;
        check_line_field("FTP password", &password)?;
        let limit = context.connect_timeout;
        let control = context.block_on(async move {
            let tcp = connect_any(addrs, limit).await?;
            let mut control = Control {
                stream: BufReader::new(tcp),
            };
            control.read_reply().await?.expect(&[220])?;
            let reply = control.command(&format!("USER {}", user)).await?;
            match reply.code {
                230 => {}
                331 | 332 => {
                    control
                        .command(&format!("PASS {}", password))
                        .await?
                        .expect(&[230, 202])?;
                }
                _ => return Err(reply.into_error()),
            }
            Ok(control)
        })?;
        Ok(Self {
            context,
            control: Some(control),
            scheme: endpoint.scheme,
        })
    }

    fn control(&mut self) -> Result<&mut Control> {
        self.control.as_mut().ok_or(WebError::NotConnected)
    }

    fn download(&mut self, path: &str, mode: TransferMode, sink: &mut dyn Write) -> Result<u64> {
        check_line_field("FTP path", path)?;
        let limit = self.context.connect_timeout;
        let command = format!("RETR {}", path);
        let context = self.context.clone();
        let control = self.control()?;
        context.block_on(async move {
            let mut data = control.open_data(mode, &command, limit).await?;
            let copied: io::Result<u64> = async {
                let mut decoder = converts_line_ends(mode).then(LineEndDecoder::default);
                let mut buf = vec![0u8; DATA_CHUNK];
                let mut converted = Vec::new();
                let mut total = 0u64;
                loop {
                    let n = data.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    match decoder {
                        Some(ref mut d) => {
                            converted.clear();
                            d.decode(&buf[..n], &mut converted);
                            sink.write_all(&converted)?;
                            total += converted.len() as u64;
                        }
                        None => {
                            sink.write_all(&buf[..n])?;
                            total += n as u64;
                        }
                    }
                }
                if let Some(ref mut d) = decoder {
                    converted.clear();
                    d.finish(&mut converted);
                    sink.write_all(&converted)?;
                    total += converted.len() as u64;
                }
                Ok(total)
            }
            .await;
            drop(data);
            control.finish_transfer(copied, limit).await
        })
    }

    fn upload(&mut self, path: &str, mode: TransferMode, source: &mut dyn Read) -> Result<u64> {
        check_line_field("FTP path", path)?;
        let limit = self.context.connect_timeout;
        let command = format!("STOR {}", path);
        let context = self.context.clone();
        let control = self.control()?;
        context.block_on(async move {
            let mut data = control.open_data(mode, &command, limit).await?;
            let copied: io::Result<u64> = async {
                let mut encoder = converts_line_ends(mode).then(LineEndEncoder::default);
                let mut buf = vec![0u8; DATA_CHUNK];
                let mut converted = Vec::new();
                let mut total = 0u64;
                loop {
                    let n = source.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    total += n as u64;
                    match encoder {
                        Some(ref mut e) => {
                            converted.clear();
                            e.encode(&buf[..n], &mut converted);
                            data.write_all(&converted).await?;
                        }
                        None => data.write_all(&buf[..n]).await?,
                    }
                }
                data.shutdown().await?;
                Ok(total)
            }
            .await;
            drop(data);
            control.finish_transfer(copied, limit).await
        })
    }
}

impl Connection for FtpConnection {
    fn send(&mut self, _head: &RequestHead, _body: Option<&dyn RequestBody>) -> Result<Box<dyn Exchange>> {
        Err(WebError::WrongProtocol {
            expected: "http or https",
            actual: self.scheme,
        })
    }

    fn retrieve(&mut self, path: &str, mode: TransferMode, sink: &mut dyn Write) -> Result<u64> {
        let result = self.download(path, mode, sink);
        self.context.report(result)
    }

    fn store(&mut self, path: &str, mode: TransferMode, source: &mut dyn Read) -> Result<u64> {
        let result = self.upload(path, mode, source);
        self.context.report(result)
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut control) = self.control.take() else {
            return Ok(());
        };
        let quit = self.context.block_on(async {
            control.command("QUIT").await?;
            Ok(())
        });
        if let Err(e) = quit {
            warn!("FTP QUIT failed: {}", e);
        }
        let _guard = self.context.enter();
        drop(control);
        Ok(())
    }
}

impl Drop for FtpConnection {
    fn drop(&mut self) {
        let _ = Connection::close(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_lines() {
        assert_eq!(parse_reply_line("220 ready"), Some((220, false, "ready")));
        assert_eq!(parse_reply_line("230-Welcome"), Some((230, true, "Welcome")));
        assert_eq!(parse_reply_line("200"), Some((200, false, "")));
        assert_eq!(parse_reply_line("hello"), None);
        assert_eq!(parse_reply_line("999 nope"), None);
        assert_eq!(parse_reply_line("2x0 bad"), None);
    }

    #[test]
    fn pasv_address() {
        let addr = parse_pasv("Entering Passive Mode (192,168,1,2,19,137)").unwrap();
        assert_eq!(addr, "192.168.1.2:5001".parse().unwrap());
        assert!(parse_pasv("Entering Passive Mode").is_none());
        assert!(parse_pasv("(1,2,3,4,5)").is_none());
        assert!(parse_pasv("(1,2,3,4,5,256)").is_none());
    }

    #[test]
    fn epsv_port() {
        assert_eq!(parse_epsv("Entering Extended Passive Mode (|||6446|)"), Some(6446));
        assert_eq!(parse_epsv("no port"), None);
    }

    #[test]
    fn line_ends_across_chunks() {
        let mut d = LineEndDecoder::default();
        let mut out = Vec::new();
        d.decode(b"one\r", &mut out);
        d.decode(b"\ntwo\r\r\nthree\r", &mut out);
        d.finish(&mut out);
        assert_eq!(out, b"one\ntwo\r\nthree\r");

        let mut e = LineEndEncoder::default();
        let mut wire = Vec::new();
        e.encode(b"a\nb\r", &mut wire);
        e.encode(b"\nc\n", &mut wire);
        assert_eq!(wire, b"a\r\nb\r\nc\r\n");
    }

    #[test]
    fn local_crlf_is_not_restored_by_ascii_download() {
        let mut wire = Vec::new();
        LineEndEncoder::default().encode(b"dos\r\nunix\n", &mut wire);
        assert_eq!(wire, b"dos\r\nunix\r\n");

        let mut d = LineEndDecoder::default();
        let mut local = Vec::new();
        d.decode(&wire, &mut local);
        d.finish(&mut local);
        assert_eq!(local, b"dos\nunix\n");
    }

    async fn control_reading(reply: Vec<u8>) -> Control {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut peer, _) = listener.accept().await.unwrap();
            let _ = peer.write_all(&reply).await;
            let _ = peer.shutdown().await;
        });
        Control {
            stream: BufReader::new(TcpStream::connect(addr).await.unwrap()),
        }
    }

    #[tokio::test]
    async fn endless_reply_line_is_refused() {
        let mut line = b"220 ".to_vec();
        line.resize(MAX_REPLY_LINE as usize * 2, b'x');
        let mut control = control_reading(line).await;
        let err = control.read_reply().await.unwrap_err();
        assert!(matches!(err, WebError::Protocol(ref m) if m.contains("too long")));
    }

    #[tokio::test]
    async fn endless_multiline_reply_is_refused() {
        let mut reply = Vec::new();
        for _ in 0..MAX_REPLY_LINES + 1 {
            reply.extend_from_slice(b"220-more\r\n");
        }
        reply.extend_from_slice(b"220 done\r\n");
        let mut control = control_reading(reply).await;
        assert!(matches!(control.read_reply().await, Err(WebError::Protocol(_))));

        let mut control = control_reading(b"220-a\r\n b\r\n220 c\r\n".to_vec()).await;
        let reply = control.read_reply().await.unwrap();
        assert_eq!(reply.code, 220);
    }
}
