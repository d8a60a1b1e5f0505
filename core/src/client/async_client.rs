/*
 * async_client.rs
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

//! Completion-signal wrapper around `WebClient`.
//!
//! Each `request` arms a fresh signal. The transport's RequestComplete status, or any holder
//! of a `CompletionHandle`, fires it; `wait_complete` blocks until it fires or times out.
//! `response` retires the signal. A timed-out wait does not cancel the request.

use std::ops::{Deref, DerefMut};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::trace;

use crate::client::{RequestMethod, WebClient};
use crate::error::Result;
use crate::transport::{StatusListener, TransportStatus};

struct Armed {
    tx: SyncSender<()>,
    fired: bool,
}

type Slot = Arc<Mutex<Option<Armed>>>;

fn lock(slot: &Mutex<Option<Armed>>) -> MutexGuard<'_, Option<Armed>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fires the current completion signal from any thread.
#[derive(Clone)]
pub struct CompletionHandle {
    slot: Slot,
}

impl CompletionHandle {
    /// Signal completion. Returns false when no signal is armed or it already fired.
    pub fn set_complete(&self) -> bool {
        let mut slot = lock(&self.slot);
        match slot.as_mut() {
            Some(armed) if !armed.fired => {
                armed.fired = armed.tx.try_send(()).is_ok();
                armed.fired
            }
            _ => false,
        }
    }
}

pub struct AsyncWebClient {
    client: WebClient,
    handle: CompletionHandle,
    signal: Option<Receiver<()>>,
}

impl AsyncWebClient {
    /// Wrap `client`, routing its transport's completion status to the signal.
    pub fn new(mut client: WebClient) -> Self {
        let handle = CompletionHandle {
            slot: Arc::new(Mutex::new(None)),
        };
        let forward = handle.clone();
        let listener: StatusListener = Arc::new(move |status| {
            if status == TransportStatus::RequestComplete {
                trace!("transport reported completion");
                forward.set_complete();
            }
        });
        client.set_status_listener(Some(listener));
        Self {
            client,
            handle,
            signal: None,
        }
    }

    /// Network client with default configuration.
    pub fn network() -> Result<Self> {
        Ok(Self::new(WebClient::network()?))
    }

    fn arm(&mut self) {
        let (tx, rx) = sync_channel(1);
        *lock(&self.handle.slot) = Some(Armed { tx, fired: false });
        self.signal = Some(rx);
    }

    fn retire(&mut self) {
        *lock(&self.handle.slot) = None;
        self.signal = None;
    }

    /// Arm a new completion signal, replacing any outstanding one, then send the request.
    pub fn request(&mut self, uri: &str, method: RequestMethod, referrer: Option<&str>) -> Result<()> {
        self.arm();
        self.client.request(uri, method, referrer)
    }

    /// Retire the completion signal and read body bytes.
    pub fn response(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.retire();
        self.client.response(buf)
    }

    pub fn set_complete(&self) -> bool {
        self.handle.set_complete()
    }

    /// Block until the signal fires (true) or `timeout` elapses (false); None waits without
    /// limit. Returns false at once when no signal is armed. Consumes the firing.
    pub fn wait_complete(&self, timeout: Option<Duration>) -> bool {
        let Some(ref rx) = self.signal else {
            return false;
        };
        match timeout {
            None => rx.recv().is_ok(),
            Some(limit) => match rx.recv_timeout(limit) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
            },
        }
    }

    /// Handle another thread can use to fire the signal.
    pub fn completion_handle(&self) -> CompletionHandle {
        self.handle.clone()
    }

    pub fn into_inner(mut self) -> WebClient {
        self.retire();
        self.client.set_status_listener(None);
        self.client
    }
}

impl Deref for AsyncWebClient {
    type Target = WebClient;

    fn deref(&self) -> &WebClient {
        &self.client
    }
}

impl DerefMut for AsyncWebClient {
    fn deref_mut(&mut self) -> &mut WebClient {
        &mut self.client
    }
}
