/*
 * urlencoded.rs
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

//! application/x-www-form-urlencoded bodies: `name=value` pairs joined by `&`.

use std::io::Write;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::Result;
use crate::form::{Argument, ArgumentList};
use crate::transport::RequestBody;

pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Everything except alphanumerics and `*-._` is escaped; space is then written as `+`.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, FORM).to_string().replace("%20", "+")
}

pub fn encode_pair(name: &str, value: &str) -> String {
    format!("{}={}", encode_component(name), encode_component(value))
}

/// Request body for `arguments`, written pair by pair. File arguments contribute their path
/// as the value.
#[derive(Debug, Clone)]
pub struct UrlEncodedBody {
    arguments: Vec<Argument>,
}

impl UrlEncodedBody {
    pub fn new(arguments: &ArgumentList) -> Self {
        Self {
            arguments: arguments.iter().cloned().collect(),
        }
    }
}

impl RequestBody for UrlEncodedBody {
    fn content_length(&self) -> u64 {
        let separators = self.arguments.len().saturating_sub(1) as u64;
        self.arguments.iter().map(Argument::urlencoded_length).sum::<u64>() + separators
    }

    fn write_to(&self, out: &mut dyn Write) -> Result<u64> {
        let mut written = 0u64;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                out.write_all(b"&")?;
                written += 1;
            }
            written += argument.write_urlencoded(out)?;
        }
        Ok(written)
    }
}
