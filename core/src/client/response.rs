/*
 * response.rs
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

//! Response metadata, kept after the body is drained until the next request or close.

use crate::form::Cookie;
use crate::transport::Exchange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    status: u16,
    headers: Vec<(String, String)>,
    raw_header: Vec<u8>,
    cookies: Vec<Cookie>,
}

impl ResponseInfo {
    pub(crate) fn from_exchange(exchange: &dyn Exchange) -> Self {
        let headers = exchange.headers().to_vec();
        let cookies = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, v)| parse_set_cookie(v))
            .collect();
        Self {
            status: exchange.status(),
            headers,
            raw_header: exchange.raw_header().to_vec(),
            cookies,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Declared Content-Length; None when absent or unparsable (chunked or read-until-close).
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn raw_header(&self) -> &[u8] {
        &self.raw_header
    }

    /// Cookies the server set, in header order.
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }
}

/// Name and value of a Set-Cookie header; attributes are dropped.
pub fn parse_set_cookie(value: &str) -> Option<Cookie> {
    let pair = value.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
    })
}
