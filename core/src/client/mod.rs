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

//! The client: connect to one server, issue requests, stream responses, transfer FTP files.
//!
//! ```text
//! Idle --connect--> Connected --request--> Requested --response(n>0)--> Reading
//!                       ^                      |                           |
//!                       +------ response(0) ---+---------------------------+
//! any --close--> Closed --connect--> Connected
//! ```
//!
//! A request issued before the previous body reached end of body fails with
//! `WebError::ResponsePending`.

pub mod async_client;
pub mod method;
pub mod response;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::content_type::ContentTypeResolver;
use crate::error::{Result, WebError};
use crate::form::{ArgumentList, Cookie, CookieJar};
use crate::transport::{
    check_line_field, Endpoint, HandleSet, NetTransport, RequestHead, StatusListener, TransferMode,
    Transport,
};
use crate::uri::{parse_url, request_path, Scheme};

pub use async_client::{AsyncWebClient, CompletionHandle};
pub use method::RequestMethod;
pub use response::ResponseInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connected,
    /// Response head received, no body read yet.
    Requested,
    /// Body partially read.
    Reading,
    Closed,
}

/// Parameters of `WebClient::connect_with`. Fields left as None come from the address URL
/// (or, for the agent, from the client configuration).
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub address: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub scheme: Option<Scheme>,
    pub agent: Option<String>,
}

impl ConnectOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Merge the options over the parsed address.
    fn endpoint(&self) -> Result<Endpoint> {
        let parts = parse_url(&self.address);
        if !parts.is_valid() {
            return Err(WebError::InvalidUrl(self.address.clone()));
        }
        let scheme = self.scheme.unwrap_or(parts.scheme);
        let port = match self.port {
            Some(port) => port,
            // An implied port follows an overridden scheme.
            None if parts.port == parts.scheme.default_port() => scheme.default_port(),
            None => parts.port,
        };
        Ok(Endpoint {
            scheme,
            host: parts.host,
            port,
            user: self.user.clone().or(parts.user),
            password: self.password.clone().or(parts.password),
        })
    }
}

/// Synchronous HTTP, HTTPS and FTP client for one server at a time.
pub struct WebClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    resolver: Arc<dyn ContentTypeResolver>,
    arguments: ArgumentList,
    cookies: CookieJar,
    listener: Option<StatusListener>,
    state: ClientState,
    endpoint: Option<Endpoint>,
    current_uri: Option<String>,
    response: Option<ResponseInfo>,
    // Last field: released after everything above.
    handles: Option<HandleSet>,
}

impl WebClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let resolver = Arc::new(config.extension_map());
        Self {
            transport,
            config,
            resolver,
            arguments: ArgumentList::new(),
            cookies: CookieJar::new(),
            listener: None,
            state: ClientState::Idle,
            endpoint: None,
            current_uri: None,
            response: None,
            handles: None,
        }
    }

    /// Client over the network transport with default configuration.
    pub fn network() -> Result<Self> {
        Self::network_with_config(ClientConfig::default())
    }

    pub fn network_with_config(config: ClientConfig) -> Result<Self> {
        let transport = NetTransport::from_config(&config)?;
        Ok(Self::with_config(Arc::new(transport), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the extension to content type lookup used for file parts.
    pub fn set_content_type_resolver(&mut self, resolver: impl ContentTypeResolver + 'static) {
        self.resolver = Arc::new(resolver);
    }

    /// Listener for transport status; applies to the open session and later connects.
    pub(crate) fn set_status_listener(&mut self, listener: Option<StatusListener>) {
        if let Some(handles) = self.handles.as_mut() {
            handles.set_status_listener(listener.clone());
        }
        self.listener = listener;
    }

    /// Connect to `address` (`[scheme://][user[:password]@]host[:port][/path]`).
    pub fn connect(&mut self, address: &str) -> Result<()> {
        self.connect_with(ConnectOptions::new(address))
    }

    /// Open the session and the connection. On failure the client stays unconnected and holds
    /// no handles.
    pub fn connect_with(&mut self, options: ConnectOptions) -> Result<()> {
        if self.handles.is_some() {
            return Err(WebError::AlreadyConnected);
        }
        let endpoint = options.endpoint()?;
        let agent = options.agent.as_deref().unwrap_or(&self.config.user_agent);
        check_line_field("User-Agent", agent)?;
        debug!("connecting to {}://{}:{}", endpoint.scheme, endpoint.host, endpoint.port);
        let handles = HandleSet::open(self.transport.as_ref(), agent, &endpoint, self.listener.clone())?;
        self.handles = Some(handles);
        self.current_uri = Some(parse_url(&options.address).path);
        self.endpoint = Some(endpoint);
        self.response = None;
        self.state = ClientState::Connected;
        Ok(())
    }

    /// Release the request, connection and session handles, in that order. Safe to call
    /// repeatedly; the connection state and the last response are cleared either way.
    pub fn close(&mut self) -> Result<()> {
        let result = match self.handles.take() {
            Some(mut handles) => handles.close(),
            None => Ok(()),
        };
        if self.state != ClientState::Idle || result.is_err() {
            self.state = ClientState::Closed;
        }
        self.endpoint = None;
        self.current_uri = None;
        self.response = None;
        result
    }

    fn connected_endpoint(&self) -> Result<&Endpoint> {
        match (self.handles.as_ref(), self.endpoint.as_ref()) {
            (Some(_), Some(endpoint)) => Ok(endpoint),
            _ => Err(WebError::NotConnected),
        }
    }

    /// Send a request for `uri` (a path, or a full URL whose path is used). Arguments become
    /// the body for the POST methods; cookies go in the Cookie header. On success the response
    /// head has been received and its metadata is available.
    pub fn request(&mut self, uri: &str, method: RequestMethod, referrer: Option<&str>) -> Result<()> {
        let scheme = self.connected_endpoint()?.scheme;
        if !scheme.is_http() {
            return Err(WebError::WrongProtocol {
                expected: "http or https",
                actual: scheme,
            });
        }
        if matches!(self.state, ClientState::Requested | ClientState::Reading) {
            return Err(WebError::ResponsePending);
        }

        let path = request_path(uri)?;
        let prepared = method.strategy().prepare(&method::BodyInput {
            arguments: &self.arguments,
            boundary: &self.config.boundary,
            resolver: self.resolver.as_ref(),
            chunk_size: self.config.upload_chunk_size,
        })?;

        let mut head = RequestHead::new(method.verb(), path);
        head.header("Accept", "*/*");
        if let Some(content_type) = prepared.content_type {
            head.header("Content-Type", content_type);
        }
        if let Some(cookies) = self.cookies.header_value() {
            head.header("Cookie", cookies);
        }
        if let Some(referrer) = referrer {
            head.header("Referer", referrer);
        }
        head.validate()?;

        self.response = None;
        let handles = self.handles.as_mut().ok_or(WebError::NotConnected)?;
        if let Err(e) = handles.release_request() {
            warn!("closing previous request: {}", e);
        }
        let connection = handles.connection_mut().ok_or(WebError::NotConnected)?;
        debug!("{} {}", head.method, head.path);
        let exchange = connection.send(&head, prepared.body.as_deref())?;
        let info = ResponseInfo::from_exchange(exchange.as_ref());
        debug!("{} {} -> {}", head.method, head.path, info.status());
        handles.set_request(exchange);
        self.response = Some(info);
        self.current_uri = Some(uri.to_string());
        self.state = ClientState::Requested;
        Ok(())
    }

    /// Read response body bytes into `buf`. `Ok(0)` means end of body (or an empty `buf`); a
    /// failed read is an error. After end of body the request handle is released and further
    /// calls keep returning `Ok(0)` until the next request.
    pub fn response(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.state {
            ClientState::Requested | ClientState::Reading => {}
            ClientState::Connected if self.response.is_some() => return Ok(0),
            ClientState::Idle | ClientState::Closed => return Err(WebError::NotConnected),
            ClientState::Connected => return Err(WebError::NoResponse),
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let handles = self.handles.as_mut().ok_or(WebError::NotConnected)?;
        let exchange = handles.request_mut().ok_or(WebError::NoResponse)?;
        match exchange.read(buf) {
            Ok(0) => {
                trace!("end of response body");
                self.state = ClientState::Connected;
                handles.release_request()?;
                Ok(0)
            }
            Ok(n) => {
                trace!("read {} body bytes", n);
                self.state = ClientState::Reading;
                Ok(n)
            }
            Err(e) => {
                debug!("response read failed: {}", e);
                self.state = ClientState::Connected;
                if let Err(close_err) = handles.release_request() {
                    warn!("closing failed request: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Read the rest of the body into a vector.
    pub fn response_bytes(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.response(&mut buf)?;
            if n == 0 {
                return Ok(body);
            }
            body.extend_from_slice(&buf[..n]);
        }
    }

    pub fn response_info(&self) -> Option<&ResponseInfo> {
        self.response.as_ref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(ResponseInfo::status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.response.as_ref().and_then(ResponseInfo::content_type)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.response.as_ref().and_then(ResponseInfo::content_length)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.header(name))
    }

    /// Raw status line and headers of the last response.
    pub fn raw_header(&self) -> Option<&[u8]> {
        self.response.as_ref().map(ResponseInfo::raw_header)
    }

    /// `index`th cookie the last response set.
    pub fn cookie(&self, index: usize) -> Option<&Cookie> {
        self.cookies().get(index)
    }

    pub fn cookies(&self) -> &[Cookie] {
        match self.response {
            Some(ref r) => r.cookies(),
            None => &[],
        }
    }

    fn ftp_path(&self, uri: &str) -> Result<String> {
        let scheme = self.connected_endpoint()?.scheme;
        if scheme != Scheme::Ftp {
            return Err(WebError::WrongProtocol {
                expected: "ftp",
                actual: scheme,
            });
        }
        let path = request_path(uri)?;
        check_line_field("FTP path", &path)?;
        Ok(path)
    }

    /// Download `uri` into `writer`. Returns the bytes written.
    pub fn get_to_writer(&mut self, uri: &str, writer: &mut dyn Write, mode: TransferMode) -> Result<u64> {
        let path = self.ftp_path(uri)?;
        let connection = self
            .handles
            .as_mut()
            .and_then(HandleSet::connection_mut)
            .ok_or(WebError::NotConnected)?;
        debug!("RETR {} ({:?})", path, mode);
        let n = connection.retrieve(&path, mode, writer)?;
        self.current_uri = Some(uri.to_string());
        Ok(n)
    }

    pub fn get_bytes(&mut self, uri: &str, mode: TransferMode) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.get_to_writer(uri, &mut data, mode)?;
        Ok(data)
    }

    /// Download `uri` to `local_path`, replacing it. A failed download removes the partial file.
    pub fn get_file(&mut self, uri: &str, local_path: impl AsRef<Path>, mode: TransferMode) -> Result<u64> {
        let local_path = local_path.as_ref();
        self.ftp_path(uri)?;
        let file = File::create(local_path)?;
        let mut out = BufWriter::new(file);
        let result = self
            .get_to_writer(uri, &mut out, mode)
            .and_then(|n| out.flush().map(|_| n).map_err(WebError::from));
        if result.is_err() {
            drop(out);
            if let Err(e) = std::fs::remove_file(local_path) {
                warn!("removing partial download {}: {}", local_path.display(), e);
            }
        }
        result
    }

    /// Upload the file at `local_path` to `uri`. Returns the bytes read from the file.
    pub fn put_file(&mut self, uri: &str, local_path: impl AsRef<Path>, mode: TransferMode) -> Result<u64> {
        let local_path = local_path.as_ref();
        let path = self.ftp_path(uri)?;
        let file = File::open(local_path).map_err(|source| WebError::Attachment {
            path: local_path.to_path_buf(),
            source,
        })?;
        let connection = self
            .handles
            .as_mut()
            .and_then(HandleSet::connection_mut)
            .ok_or(WebError::NotConnected)?;
        debug!("STOR {} ({:?}) from {}", path, mode, local_path.display());
        let n = connection.store(&path, mode, &mut BufReader::new(file))?;
        self.current_uri = Some(uri.to_string());
        Ok(n)
    }

    pub fn put_bytes(&mut self, uri: &str, data: &[u8], mode: TransferMode) -> Result<u64> {
        let path = self.ftp_path(uri)?;
        let connection = self
            .handles
            .as_mut()
            .and_then(HandleSet::connection_mut)
            .ok_or(WebError::NotConnected)?;
        let n = connection.store(&path, mode, &mut &data[..])?;
        self.current_uri = Some(uri.to_string());
        Ok(n)
    }

    pub fn arguments(&self) -> &ArgumentList {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut ArgumentList {
        &mut self.arguments
    }

    pub fn reset_arguments(&mut self) {
        self.arguments.reset();
    }

    /// Cookies sent with every request.
    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    pub fn reset_cookies(&mut self) {
        self.cookies.reset();
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.handles.is_some()
    }

    pub fn address(&self) -> Option<&str> {
        self.endpoint.as_ref().map(|e| e.host.as_str())
    }

    pub fn port(&self) -> Option<u16> {
        self.endpoint.as_ref().map(|e| e.port)
    }

    pub fn protocol(&self) -> Option<Scheme> {
        self.endpoint.as_ref().map(|e| e.scheme)
    }

    pub fn user(&self) -> Option<&str> {
        self.endpoint.as_ref().and_then(|e| e.user.as_deref())
    }

    pub fn password(&self) -> Option<&str> {
        self.endpoint.as_ref().and_then(|e| e.password.as_deref())
    }

    /// URI of the last connect, request or transfer.
    pub fn current_uri(&self) -> Option<&str> {
        self.current_uri.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryResponse, MemoryTransport};

    fn client() -> (MemoryTransport, WebClient) {
        let transport = MemoryTransport::new();
        let client = WebClient::new(Arc::new(transport.clone()));
        (transport, client)
    }

    #[test]
    fn options_override_parsed_address() {
        let ep = ConnectOptions::new("http://u:p@example.com/x")
            .scheme(Scheme::Https)
            .endpoint()
            .unwrap();
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.port, 443);
        assert_eq!(ep.user.as_deref(), Some("u"));

        let ep = ConnectOptions::new("example.com:8080")
            .scheme(Scheme::Https)
            .credentials("a", "b")
            .endpoint()
            .unwrap();
        assert_eq!(ep.port, 8080);
        assert_eq!(ep.password.as_deref(), Some("b"));

        let ep = ConnectOptions::new("example.com").port(2121).scheme(Scheme::Ftp).endpoint().unwrap();
        assert_eq!((ep.scheme, ep.port), (Scheme::Ftp, 2121));
    }

    #[test]
    fn invalid_address_is_rejected_without_handles() {
        let (transport, mut c) = client();
        assert!(matches!(c.connect("http://"), Err(WebError::InvalidUrl(_))));
        assert!(matches!(c.connect("gopher://x"), Err(WebError::InvalidUrl(_))));
        assert_eq!(c.state(), ClientState::Idle);
        assert!(transport.events().is_empty());
    }

    #[test]
    fn connection_state_accessors() {
        let (_t, mut c) = client();
        c.connect("https://bob:pw@example.com:8443/start").unwrap();
        assert_eq!(c.address(), Some("example.com"));
        assert_eq!(c.port(), Some(8443));
        assert_eq!(c.protocol(), Some(Scheme::Https));
        assert_eq!(c.user(), Some("bob"));
        assert_eq!(c.password(), Some("pw"));
        assert_eq!(c.current_uri(), Some("/start"));
        c.close().unwrap();
        assert_eq!(c.address(), None);
        assert_eq!(c.state(), ClientState::Closed);
    }

    #[test]
    fn user_agent_comes_from_config_or_options() {
        let (transport, mut c) = client();
        c.connect("example.com").unwrap();
        c.request("/", RequestMethod::Get, None).unwrap();
        assert_eq!(transport.last_request().unwrap().agent, crate::config::DEFAULT_USER_AGENT);
        c.close().unwrap();
        c.connect_with(ConnectOptions::new("example.com").agent("Tester/2")).unwrap();
        c.request("/", RequestMethod::Get, None).unwrap();
        assert_eq!(transport.last_request().unwrap().agent, "Tester/2");
    }

    #[test]
    fn response_before_request() {
        let (_t, mut c) = client();
        let mut buf = [0u8; 4];
        assert!(matches!(c.response(&mut buf), Err(WebError::NotConnected)));
        c.connect("example.com").unwrap();
        assert!(matches!(c.response(&mut buf), Err(WebError::NoResponse)));
    }

    #[test]
    fn metadata_survives_drain_and_clears_on_close() {
        let (transport, mut c) = client();
        transport.route(
            "/page",
            MemoryResponse::ok("body")
                .with_header("Content-Type", "text/html")
                .with_header("Set-Cookie", "sid=1; Path=/"),
        );
        c.connect("example.com").unwrap();
        c.request("/page", RequestMethod::Get, Some("http://ref.example/")).unwrap();
        assert_eq!(c.response_bytes().unwrap(), b"body");
        assert_eq!(c.status_code(), Some(200));
        assert_eq!(c.content_type(), Some("text/html"));
        assert_eq!(c.content_length(), Some(4));
        assert_eq!(c.cookie(0).map(|k| k.value.as_str()), Some("1"));
        assert!(c.raw_header().unwrap().starts_with(b"HTTP/1.1 200 OK\r\n"));
        let head = transport.last_request().unwrap().head;
        assert_eq!(head.get("Referer"), Some("http://ref.example/"));
        assert_eq!(head.get("Accept"), Some("*/*"));
        c.close().unwrap();
        assert_eq!(c.status_code(), None);
        assert!(c.raw_header().is_none());
    }
}
