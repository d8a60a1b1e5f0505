/*
 * lib.rs
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

//! Webclient core: a blocking HTTP, HTTPS and FTP client with form and multipart uploads,
//! cookies, and a completion-signal variant for callers that wait on another thread.
//!
//! ```no_run
//! use webclient_core::{RequestMethod, WebClient};
//!
//! # fn main() -> webclient_core::Result<()> {
//! let mut client = WebClient::network()?;
//! client.connect("http://www.example.com")?;
//! client.arguments_mut().add("q", "rust");
//! client.request("/search", RequestMethod::Post, None)?;
//! let body = client.response_bytes()?;
//! println!("{} {} bytes", client.status_code().unwrap_or(0), body.len());
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod content_type;
pub mod error;
pub mod form;
pub mod transport;
pub mod uri;

pub use client::{
    AsyncWebClient, ClientState, CompletionHandle, ConnectOptions, RequestMethod, ResponseInfo, WebClient,
};
pub use config::{BoundaryPolicy, ClientConfig};
pub use content_type::{ContentTypeResolver, ExtensionMap};
pub use error::{Result, WebError};
pub use form::{Argument, ArgumentList, Cookie, CookieJar, MultipartEncoder};
pub use transport::{MemoryTransport, NetTransport, TransferMode, Transport};
pub use uri::{parse_url, Scheme, UrlParts};
