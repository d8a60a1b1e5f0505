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

//! POST arguments and outgoing cookies.
//!
//! `ArgumentList` and `CookieJar` keep insertion order; that order is the order of fields in
//! a request body and of pairs in the `Cookie:` header. Neither is shared between clients,
//! and a client's lists cannot change while it has a request in flight because every
//! mutation goes through `&mut WebClient`.

pub mod multipart;
pub mod urlencoded;

use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::content_type::{content_type_for, ContentTypeResolver};
use crate::error::Result;

pub use multipart::MultipartEncoder;
pub use urlencoded::UrlEncodedBody;

/// Text form of a field or cookie value. Built from strings and the numeric types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue(String);

impl FieldValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue(s.clone())
    }
}

macro_rules! field_value_from_display {
    ($($t:ty),+) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue(v.to_string())
                }
            }
        )+
    };
}

field_value_from_display!(i32, i64, u32, u64, f32, f64);

/// One POST field, or one uploaded file when `is_file` is set (then `value` is the local path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub value: String,
    pub is_file: bool,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into().into_string(),
            is_file: false,
        }
    }

    pub fn file(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            value: path.as_ref().to_string_lossy().into_owned(),
            is_file: true,
        }
    }

    /// Content type of the attached file; `application/octet-stream` when unknown.
    pub fn content_type(&self, resolver: &dyn ContentTypeResolver) -> String {
        content_type_for(Path::new(&self.value), resolver)
    }

    /// Bytes of this argument as one `name=value` pair (no separator).
    pub fn urlencoded_length(&self) -> u64 {
        urlencoded::encode_pair(&self.name, &self.value).len() as u64
    }

    pub fn write_urlencoded(&self, out: &mut dyn Write) -> Result<u64> {
        let pair = urlencoded::encode_pair(&self.name, &self.value);
        out.write_all(pair.as_bytes())?;
        Ok(pair.len() as u64)
    }

    /// Bytes of this argument as a complete multipart section, file contents included.
    /// Only the file's size is read from disk.
    pub fn multipart_length(&self, boundary: &str, resolver: &dyn ContentTypeResolver) -> Result<u64> {
        Ok(multipart::Part::from_argument(self, boundary, resolver)?.encoded_length())
    }

    /// Write this argument as a multipart section; returns the bytes written, which equals
    /// `multipart_length` for the same boundary.
    pub fn write_multipart(
        &self,
        out: &mut dyn Write,
        boundary: &str,
        resolver: &dyn ContentTypeResolver,
        chunk_size: usize,
    ) -> Result<u64> {
        multipart::Part::from_argument(self, boundary, resolver)?.write_to(out, chunk_size)
    }
}

/// Ordered POST arguments of one client.
#[derive(Debug, Clone, Default)]
pub struct ArgumentList {
    items: Vec<Argument>,
}

impl ArgumentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.items.push(Argument::new(name, value));
        self
    }

    pub fn add_file(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> &mut Self {
        self.items.push(Argument::file(name, path));
        self
    }

    pub fn push(&mut self, argument: Argument) -> &mut Self {
        self.items.push(argument);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_files(&self) -> bool {
        self.items.iter().any(|a| a.is_file)
    }
}

impl<'a> IntoIterator for &'a ArgumentList {
    type Item = &'a Argument;
    type IntoIter = std::slice::Iter<'a, Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into().into_string(),
        }
    }
}

/// Cookies sent with every request of one client, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    items: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.items.push(Cookie::new(name, value));
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Value of the outgoing `Cookie:` header, or None when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .items
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_constructors() {
        let mut args = ArgumentList::new();
        args.add("s", "text")
            .add("i", 42i32)
            .add("l", -7_000_000_000i64)
            .add("f", 1.5f32)
            .add("d", 0.25f64)
            .add_file("upload", "/tmp/report.pdf");
        let values: Vec<&str> = args.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, ["text", "42", "-7000000000", "1.5", "0.25", "/tmp/report.pdf"]);
        assert!(args.has_files());
        assert_eq!(args.len(), 6);
        args.reset();
        assert!(args.is_empty());
    }

    #[test]
    fn cookie_header_keeps_insertion_order() {
        let mut jar = CookieJar::new();
        assert_eq!(jar.header_value(), None);
        jar.add("a", 1).add("b", "2");
        assert_eq!(jar.header_value().as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn urlencoded_length_matches_written_bytes() {
        let arg = Argument::new("full name", "Jane & John=Doe");
        let mut out = Vec::new();
        let n = arg.write_urlencoded(&mut out).unwrap();
        assert_eq!(n, arg.urlencoded_length());
        assert_eq!(n as usize, out.len());
        assert_eq!(out, b"full+name=Jane+%26+John%3DDoe");
    }
}
