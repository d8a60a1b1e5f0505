/*
 * config.rs
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

//! Client configuration: user agent, multipart boundary policy, upload chunk size,
//! connect timeout and content type overrides. Every field has a default, so a JSON
//! document only needs the keys it changes, e.g. `{"user_agent": "Viewer/2.0"}`.

use std::collections::HashMap;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;

use crate::content_type::ExtensionMap;
use crate::error::{Result, WebError};

/// User agent sent when neither the config nor `connect` supplies one.
pub const DEFAULT_USER_AGENT: &str = concat!("Webclient/", env!("CARGO_PKG_VERSION"));

/// Prefix of generated boundary tags.
const BOUNDARY_PREFIX: &str = "----WebclientFormBoundary";

/// How the multipart boundary tag is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Fresh random tag per request.
    Random,
    /// Same tag for every request.
    Fixed(String),
}

/// RFC 2046 boundary: 1 to 70 of `bchars`, not ending in a space.
fn is_valid_boundary(tag: &str) -> bool {
    const SPECIALS: &[u8] = b"'()+_,-./:=? ";
    (1..=70).contains(&tag.len())
        && !tag.ends_with(' ')
        && tag.bytes().all(|b| b.is_ascii_alphanumeric() || SPECIALS.contains(&b))
}

impl BoundaryPolicy {
    /// Fails with `InvalidHeader` for a fixed tag that is not a valid boundary.
    pub fn validate(&self) -> Result<()> {
        match self {
            BoundaryPolicy::Fixed(tag) if !is_valid_boundary(tag) => {
                Err(WebError::InvalidHeader(format!("multipart boundary {:?}", tag)))
            }
            _ => Ok(()),
        }
    }

    pub fn next_boundary(&self) -> Result<String> {
        self.validate()?;
        Ok(match self {
            BoundaryPolicy::Random => {
                let suffix: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(16)
                    .map(char::from)
                    .collect();
                format!("{}{}", BOUNDARY_PREFIX, suffix)
            }
            BoundaryPolicy::Fixed(tag) => tag.clone(),
        })
    }
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        BoundaryPolicy::Random
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub boundary: BoundaryPolicy,
    /// Bytes read from an attached file per write.
    pub upload_chunk_size: usize,
    pub connect_timeout_secs: u64,
    /// Extension to content type overrides layered over the built-in table.
    pub content_types: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            boundary: BoundaryPolicy::Random,
            upload_chunk_size: 64 * 1024,
            connect_timeout_secs: 15,
            content_types: HashMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: ClientConfig = serde_json::from_str(json)?;
        if let Err(e) = config.boundary.validate() {
            return Err(WebError::Config(<serde_json::Error as serde::de::Error>::custom(e)));
        }
        if config.upload_chunk_size == 0 {
            config.upload_chunk_size = ClientConfig::default().upload_chunk_size;
        }
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Built-in extension table with this config's overrides applied.
    pub fn extension_map(&self) -> ExtensionMap {
        let mut map = ExtensionMap::default();
        for (ext, ty) in &self.content_types {
            map.insert(ext, ty.clone());
        }
        map
    }
}
