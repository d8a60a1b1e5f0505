/*
 * content_type.rs
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

//! File extension to MIME type lookup used for multipart file parts.
//! The resolver is injected into the client; nothing here consults the host OS.

use std::collections::HashMap;
use std::path::Path;

/// Fallback for unknown extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Maps a lowercase file extension (without dot) to a content type.
pub trait ContentTypeResolver: Send + Sync {
    fn resolve(&self, extension: &str) -> Option<String>;
}

impl<F> ContentTypeResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, extension: &str) -> Option<String> {
        self(extension)
    }
}

/// Content type for `path` via `resolver`, or `application/octet-stream`.
pub fn content_type_for(path: &Path, resolver: &dyn ContentTypeResolver) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .and_then(|e| resolver.resolve(&e))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Table-driven resolver. `ExtensionMap::default()` knows the common web types.
#[derive(Debug, Clone)]
pub struct ExtensionMap {
    types: HashMap<String, String>,
}

impl ExtensionMap {
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Add or replace a mapping. Leading dots and case are ignored.
    pub fn insert(&mut self, extension: &str, content_type: impl Into<String>) -> &mut Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.types.insert(ext, content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for ExtensionMap {
    fn default() -> Self {
        let mut map = Self::empty();
        let builtin: [(&str, mime::Mime); 13] = [
            ("txt", mime::TEXT_PLAIN),
            ("htm", mime::TEXT_HTML),
            ("html", mime::TEXT_HTML),
            ("css", mime::TEXT_CSS),
            ("csv", mime::TEXT_CSV),
            ("js", mime::TEXT_JAVASCRIPT),
            ("xml", mime::TEXT_XML),
            ("json", mime::APPLICATION_JSON),
            ("pdf", mime::APPLICATION_PDF),
            ("png", mime::IMAGE_PNG),
            ("jpg", mime::IMAGE_JPEG),
            ("jpeg", mime::IMAGE_JPEG),
            ("gif", mime::IMAGE_GIF),
        ];
        for (ext, m) in builtin {
            map.insert(ext, m.essence_str());
        }
        map.insert("svg", mime::IMAGE_SVG.essence_str());
        map.insert("bmp", mime::IMAGE_BMP.essence_str());
        map.insert("zip", "application/zip");
        map.insert("gz", "application/gzip");
        map
    }
}

impl ContentTypeResolver for ExtensionMap {
    fn resolve(&self, extension: &str) -> Option<String> {
        self.types.get(extension).cloned()
    }
}
