/*
 * memory.rs
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

//! In-process transport: scripted HTTP responses, an in-memory FTP file store, and a log of
//! every request and handle open/close. Clones share state, so a test can keep one clone
//! for inspection while the client owns another.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, WebError};
use crate::transport::{
    format_raw_header, Connection, Endpoint, Exchange, ListenerSlot, RequestBody, RequestHead,
    Session, StatusListener, TransferMode, Transport, TransportStatus,
};
use crate::uri::Scheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Session,
    Connection,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEvent {
    Opened(HandleKind),
    Closed(HandleKind),
}

/// Canned response for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MemoryResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// 200 OK with `body` and a matching Content-Length.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "OK").with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-length"));
        self.headers
            .push(("Content-Length".to_string(), self.body.len().to_string()));
        self
    }
}

/// One request as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: Endpoint,
    pub agent: String,
    pub head: RequestHead,
    /// None when the request had no body.
    pub body: Option<Vec<u8>>,
}

#[derive(Default)]
struct MemoryState {
    routes: HashMap<String, MemoryResponse>,
    requests: Vec<RecordedRequest>,
    files: HashMap<String, Vec<u8>>,
    transfers: Vec<(String, TransferMode)>,
    refused: HashSet<String>,
    notify_completion: bool,
    read_chunk: Option<usize>,
    fail_reads_after: Option<usize>,
    events: Vec<HandleEvent>,
    open_handles: usize,
}

#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for requests to `path` (exact match first, then without the query).
    pub fn route(&self, path: &str, response: MemoryResponse) -> &Self {
        lock(&self.state).routes.insert(path.to_string(), response);
        self
    }

    /// Make `connect` to `host` fail with ConnectionRefused.
    pub fn refuse_host(&self, host: &str) -> &Self {
        lock(&self.state).refused.insert(host.to_ascii_lowercase());
        self
    }

    /// Report RequestComplete to the session listener after each request or transfer.
    pub fn notify_completion(&self, enabled: bool) -> &Self {
        lock(&self.state).notify_completion = enabled;
        self
    }

    /// Return at most `n` bytes per `Exchange::read`.
    pub fn read_chunk(&self, n: usize) -> &Self {
        lock(&self.state).read_chunk = Some(n.max(1));
        self
    }

    /// Fail body reads once `n` bytes of a response have been delivered.
    pub fn fail_reads_after(&self, n: usize) -> &Self {
        lock(&self.state).fail_reads_after = Some(n);
        self
    }

    /// Seed the FTP store.
    pub fn insert_file(&self, path: &str, data: impl Into<Vec<u8>>) -> &Self {
        lock(&self.state).files.insert(path.to_string(), data.into());
        self
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.state).files.get(path).cloned()
    }

    /// FTP transfers in order, with the mode each used.
    pub fn transfers(&self) -> Vec<(String, TransferMode)> {
        lock(&self.state).transfers.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.state).requests.last().cloned()
    }

    pub fn events(&self) -> Vec<HandleEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        lock(&self.state).open_handles
    }
}

impl Transport for MemoryTransport {
    fn open(&self, agent: &str) -> Result<Box<dyn Session>> {
        Ok(Box::new(MemorySession {
            handle: Tracked::open(&self.state, HandleKind::Session),
            agent: agent.to_string(),
            listener: ListenerSlot::default(),
        }))
    }
}

/// Records Opened on creation and Closed exactly once, on close or drop.
struct Tracked {
    state: Arc<Mutex<MemoryState>>,
    kind: HandleKind,
    closed: bool,
}

impl Tracked {
    fn open(state: &Arc<Mutex<MemoryState>>, kind: HandleKind) -> Self {
        let mut s = lock(state);
        s.events.push(HandleEvent::Opened(kind));
        s.open_handles += 1;
        drop(s);
        Self {
            state: Arc::clone(state),
            kind,
            closed: false,
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut s = lock(&self.state);
            s.events.push(HandleEvent::Closed(self.kind));
            s.open_handles = s.open_handles.saturating_sub(1);
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.close();
    }
}

struct MemorySession {
    handle: Tracked,
    agent: String,
    listener: ListenerSlot,
}

impl Session for MemorySession {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        let refused = lock(&self.handle.state)
            .refused
            .contains(&endpoint.host.to_ascii_lowercase());
        if refused {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection to {}:{} refused", endpoint.host, endpoint.port),
            )
            .into());
        }
        self.listener.notify(TransportStatus::Connected);
        Ok(Box::new(MemoryConnection {
            handle: Tracked::open(&self.handle.state, HandleKind::Connection),
            endpoint: endpoint.clone(),
            agent: self.agent.clone(),
            listener: self.listener.clone(),
        }))
    }

    fn set_status_listener(&mut self, listener: Option<StatusListener>) {
        self.listener.set(listener);
    }

    fn close(&mut self) -> Result<()> {
        self.handle.close();
        Ok(())
    }
}

struct MemoryConnection {
    handle: Tracked,
    endpoint: Endpoint,
    agent: String,
    listener: ListenerSlot,
}

impl MemoryConnection {
    fn complete(&self) {
        let notify = lock(&self.handle.state).notify_completion;
        if notify {
            self.listener.notify(TransportStatus::RequestComplete);
        }
    }

    fn require(&self, ftp: bool) -> Result<()> {
        if (self.endpoint.scheme == Scheme::Ftp) != ftp {
            return Err(WebError::protocol(format!(
                "operation not supported on {} connection",
                self.endpoint.scheme
            )));
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn send(&mut self, head: &RequestHead, body: Option<&dyn RequestBody>) -> Result<Box<dyn Exchange>> {
        self.require(false)?;
        let body = match body {
            Some(body) => {
                let declared = body.content_length();
                let mut data = Vec::new();
                let written = body.write_to(&mut data)?;
                if written != declared || data.len() as u64 != declared {
                    return Err(WebError::LengthMismatch {
                        declared,
                        written: data.len() as u64,
                    });
                }
                Some(data)
            }
            None => None,
        };
        let mut state = lock(&self.handle.state);
        state.requests.push(RecordedRequest {
            endpoint: self.endpoint.clone(),
            agent: self.agent.clone(),
            head: head.clone(),
            body,
        });
        let without_query = head.path.split('?').next().unwrap_or(&head.path);
        let response = state
            .routes
            .get(&head.path)
            .or_else(|| state.routes.get(without_query))
            .cloned()
            .unwrap_or_else(|| MemoryResponse::new(404, "Not Found").with_body(Vec::new()));
        let read_chunk = state.read_chunk;
        let fail_after = state.fail_reads_after;
        drop(state);

        let raw = format_raw_header(response.status, &response.reason, &response.headers);
        let exchange = MemoryExchange {
            handle: Tracked::open(&self.handle.state, HandleKind::Request),
            status: response.status,
            headers: response.headers,
            raw,
            body: response.body,
            pos: 0,
            read_chunk,
            fail_after,
        };
        self.complete();
        Ok(Box::new(exchange))
    }

    fn retrieve(&mut self, path: &str, mode: TransferMode, sink: &mut dyn Write) -> Result<u64> {
        self.require(true)?;
        let data = {
            let mut state = lock(&self.handle.state);
            state.transfers.push((path.to_string(), mode));
            state.files.get(path).cloned()
        };
        let data = data.ok_or_else(|| WebError::protocol(format!("550 {}: no such file", path)))?;
        sink.write_all(&data)?;
        self.complete();
        Ok(data.len() as u64)
    }

    fn store(&mut self, path: &str, mode: TransferMode, source: &mut dyn Read) -> Result<u64> {
        self.require(true)?;
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let n = data.len() as u64;
        {
            let mut state = lock(&self.handle.state);
            state.transfers.push((path.to_string(), mode));
            state.files.insert(path.to_string(), data);
        }
        self.complete();
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.handle.close();
        Ok(())
    }
}

struct MemoryExchange {
    handle: Tracked,
    status: u16,
    headers: Vec<(String, String)>,
    raw: Vec<u8>,
    body: Vec<u8>,
    pos: usize,
    read_chunk: Option<usize>,
    fail_after: Option<usize>,
}

impl Exchange for MemoryExchange {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn raw_header(&self) -> &[u8] {
        &self.raw
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut end = self.body.len().min(self.pos + buf.len());
        if let Some(chunk) = self.read_chunk {
            end = end.min(self.pos + chunk);
        }
        if let Some(limit) = self.fail_after {
            if self.pos >= limit && self.pos < self.body.len() {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset").into());
            }
            end = end.min(limit.max(self.pos));
        }
        let n = end - self.pos;
        buf[..n].copy_from_slice(&self.body[self.pos..end]);
        self.pos = end;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.handle.close();
        Ok(())
    }
}
