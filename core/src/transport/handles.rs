/*
 * handles.rs
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

//! Owned session/connection/request handles. Acquired session first, request last;
//! released request first, session last, on `close` and on drop.

use log::{debug, warn};

use crate::error::Result;
use crate::transport::{Connection, Endpoint, Exchange, Session, StatusListener, Transport};

/// The handle triple of one connected client.
pub struct HandleSet {
    // Declaration order is drop order.
    request: Option<Box<dyn Exchange>>,
    connection: Option<Box<dyn Connection>>,
    session: Option<Box<dyn Session>>,
}

impl HandleSet {
    /// Open a session and connect it to `endpoint`. If connecting fails the session is
    /// released before the error is returned.
    pub fn open(
        transport: &dyn Transport,
        agent: &str,
        endpoint: &Endpoint,
        listener: Option<StatusListener>,
    ) -> Result<Self> {
        let mut session = transport.open(agent)?;
        session.set_status_listener(listener);
        match session.connect(endpoint) {
            Ok(connection) => {
                debug!("connected to {}://{}:{}", endpoint.scheme, endpoint.host, endpoint.port);
                Ok(HandleSet {
                    request: None,
                    connection: Some(connection),
                    session: Some(session),
                })
            }
            Err(e) => {
                debug!("connect to {}:{} failed: {}", endpoint.host, endpoint.port, e);
                if let Err(close_err) = session.close() {
                    warn!("closing session after failed connect: {}", close_err);
                }
                Err(e)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn has_request(&self) -> bool {
        self.request.is_some()
    }

    /// Replace the status listener of the open session.
    pub fn set_status_listener(&mut self, listener: Option<StatusListener>) {
        if let Some(session) = self.session.as_mut() {
            session.set_status_listener(listener);
        }
    }

    pub fn connection_mut(&mut self) -> Option<&mut (dyn Connection + 'static)> {
        self.connection.as_deref_mut()
    }

    pub fn request_mut(&mut self) -> Option<&mut (dyn Exchange + 'static)> {
        self.request.as_deref_mut()
    }

    /// Store the handle of a new request, releasing the previous one first.
    pub fn set_request(&mut self, request: Box<dyn Exchange>) {
        if let Err(e) = self.release_request() {
            warn!("closing previous request failed: {}", e);
        }
        self.request = Some(request);
    }

    pub fn release_request(&mut self) -> Result<()> {
        match self.request.take() {
            Some(mut request) => request.close(),
            None => Ok(()),
        }
    }

    /// Release every handle that is still held, request → connection → session. Every handle
    /// is released even if closing an earlier one fails; the first failure is returned.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        if let Some(mut request) = self.request.take() {
            if let Err(e) = request.close() {
                warn!("closing request handle: {}", e);
                first_err.get_or_insert(e);
            }
        }
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                warn!("closing connection handle: {}", e);
                first_err.get_or_insert(e);
            }
        }
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!("closing session handle: {}", e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for HandleSet {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
