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

//! Network transport: HTTP/1.1, HTTPS and FTP over tokio sockets and rustls.
//!
//! The transport owns a small multi-thread runtime and drives it with `block_on` from the
//! caller's thread, so every `Session`/`Connection`/`Exchange` call blocks. It must not be
//! used from inside another tokio runtime.

pub mod ftp;
pub mod h1;
pub mod http;
mod tls;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::error::{Result, WebError};
use crate::transport::{
    Connection, Endpoint, ListenerSlot, Session, StatusListener, Transport, TransportStatus,
};
use crate::uri::Scheme;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct NetTransport {
    runtime: Arc<Runtime>,
    connect_timeout: Duration,
}

impl NetTransport {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("webclient-net")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new()?.with_connect_timeout(config.connect_timeout()))
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Transport for NetTransport {
    fn open(&self, agent: &str) -> Result<Box<dyn Session>> {
        Ok(Box::new(NetSession {
            context: NetContext {
                runtime: Arc::clone(&self.runtime),
                connect_timeout: self.connect_timeout,
                agent: agent.to_string(),
                listener: ListenerSlot::default(),
            },
        }))
    }
}

/// What every connection of one session shares.
#[derive(Clone)]
pub(crate) struct NetContext {
    runtime: Arc<Runtime>,
    pub(crate) connect_timeout: Duration,
    pub(crate) agent: String,
    listener: ListenerSlot,
}

impl NetContext {
    /// Run `fut` to completion on the transport runtime.
    pub(crate) fn block_on<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(WebError::protocol(
                "blocking network transport called from inside an async runtime",
            ));
        }
        self.runtime.block_on(fut)
    }

    pub(crate) fn run<T>(&self, fut: impl Future<Output = io::Result<T>>) -> Result<T> {
        self.block_on(async move { Ok(fut.await?) })
    }

    /// Enter the runtime so tokio resources can be dropped outside `run`.
    pub(crate) fn enter(&self) -> tokio::runtime::EnterGuard<'_> {
        self.runtime.enter()
    }

    pub(crate) fn notify(&self, status: TransportStatus) {
        self.listener.notify(status);
    }

    /// Report the outcome of an operation to the listener and pass it through.
    pub(crate) fn report<T>(&self, result: Result<T>) -> Result<T> {
        self.notify(if result.is_ok() {
            TransportStatus::RequestComplete
        } else {
            TransportStatus::RequestFailed
        });
        result
    }
}

/// TCP connect to the first of `addrs` that accepts within the timeout.
pub(crate) async fn connect_any(addrs: &[SocketAddr], limit: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to connect to");
    for addr in addrs {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!("connect {} failed: {}", addr, e);
                last_err = e;
            }
            Err(_) => {
                debug!("connect {} timed out", addr);
                last_err = io::Error::new(io::ErrorKind::TimedOut, format!("connect to {} timed out", addr));
            }
        }
    }
    Err(last_err)
}

async fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", host),
        ));
    }
    Ok(addrs)
}

struct NetSession {
    context: NetContext,
}

impl Session for NetSession {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        let addrs = self.context.run(resolve(&endpoint.host, endpoint.port))?;
        debug!("{} resolved to {:?}", endpoint.host, addrs);
        let connection: Box<dyn Connection> = match endpoint.scheme {
            Scheme::Http | Scheme::Https => Box::new(http::HttpConnection::new(
                self.context.clone(),
                endpoint.clone(),
                addrs,
            )),
            Scheme::Ftp => Box::new(ftp::FtpConnection::login(self.context.clone(), endpoint, &addrs)?),
        };
        self.context.notify(TransportStatus::Connected);
        Ok(connection)
    }

    fn set_status_listener(&mut self, listener: Option<StatusListener>) {
        self.context.listener.set(listener);
    }

    fn close(&mut self) -> Result<()> {
        self.context.notify(TransportStatus::Closed);
        Ok(())
    }
}
