/*
 * uri.rs
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

//! URL parsing for http, https and ftp: scheme://[user[:password]@]host[:port][/path].
//! Missing scheme means http; missing port means the scheme's default; missing path means "/".
//! Parsing never fails outright: input that cannot be decomposed yields an empty host.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::WebError;

/// Userinfo in authority: encode @ and other reserved so one @ separates userinfo from host.
const USERINFO: &AsciiSet = &CONTROLS
    .add(b'@')
    .add(b':')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b' ');

/// Protocol of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Ftp,
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ftp => "ftp",
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Ftp => 21,
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// True for the schemes served by `request`/`response`.
    pub fn is_http(&self) -> bool {
        matches!(self, Scheme::Http | Scheme::Https)
    }

    pub fn is_secure(&self) -> bool {
        *self == Scheme::Https
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Scheme::Https)
        } else if s.eq_ignore_ascii_case("ftp") {
            Ok(Scheme::Ftp)
        } else {
            Err(())
        }
    }
}

/// Decomposed URL. `host` is empty when the input could not be parsed; check `is_valid` before connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl UrlParts {
    fn invalid() -> Self {
        Self {
            scheme: Scheme::Http,
            user: None,
            password: None,
            host: String::new(),
            port: Scheme::Http.default_port(),
            path: "/".to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.host.is_empty()
    }

    /// Reassemble the URL. The port is omitted when it is the scheme's default.
    pub fn to_url(&self) -> String {
        let mut out = format!("{}://", self.scheme);
        if let Some(ref user) = self.user {
            out.push_str(&utf8_percent_encode(user, USERINFO).to_string());
            if let Some(ref password) = self.password {
                out.push(':');
                out.push_str(&utf8_percent_encode(password, USERINFO).to_string());
            }
            out.push('@');
        }
        if self.host.contains(':') {
            out.push('[');
            out.push_str(&self.host);
            out.push(']');
        } else {
            out.push_str(&self.host);
        }
        if self.port != self.scheme.default_port() {
            out.push(':');
            out.push_str(&self.port.to_string());
        }
        out.push_str(&self.path);
        out
    }
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Split `url` into scheme, credentials, host, port and path.
pub fn parse_url(url: &str) -> UrlParts {
    let url = url.trim();
    let (scheme, rest) = match url.find("://") {
        Some(i) => match url[..i].parse::<Scheme>() {
            Ok(s) => (s, &url[i + 3..]),
            Err(_) => return UrlParts::invalid(),
        },
        None => (Scheme::Http, url),
    };

    let (authority, path) = match rest.find(&['/', '?', '#'][..]) {
        Some(i) if rest.as_bytes()[i] == b'/' => (&rest[..i], rest[i..].to_string()),
        Some(i) => (&rest[..i], format!("/{}", &rest[i..])),
        None => (rest, "/".to_string()),
    };

    // The last @ separates userinfo, so an unencoded @ in the password still parses.
    let (userinfo, hostport) = match authority.rfind('@') {
        Some(i) => (Some(&authority[..i]), &authority[i + 1..]),
        None => (None, authority),
    };
    let (user, password) = match userinfo {
        Some(info) => match info.find(':') {
            Some(i) => (Some(decode(&info[..i])), Some(decode(&info[i + 1..]))),
            None => (Some(decode(info)), None),
        },
        None => (None, None),
    };

    let (host, port_str) = if let Some(stripped) = hostport.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => {
                let after = &stripped[end + 1..];
                let port = match after.strip_prefix(':') {
                    Some(p) => Some(p),
                    None if after.is_empty() => None,
                    None => return UrlParts::invalid(),
                };
                (&stripped[..end], port)
            }
            None => return UrlParts::invalid(),
        }
    } else {
        match hostport.rfind(':') {
            Some(i) => (&hostport[..i], Some(&hostport[i + 1..])),
            None => (hostport, None),
        }
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return UrlParts::invalid();
    }
    let port = match port_str {
        None | Some("") => scheme.default_port(),
        Some(p) => match p.parse::<u16>() {
            Ok(n) if n != 0 => n,
            _ => return UrlParts::invalid(),
        },
    };

    UrlParts {
        scheme,
        user,
        password,
        host: host.to_string(),
        port,
        path,
    }
}

/// True when `uri` begins with `scheme://`. A path or query that merely contains `://`
/// (`/login?next=http://a.example/`) does not count.
fn has_scheme(uri: &str) -> bool {
    match uri.find("://") {
        Some(i) => {
            let scheme = &uri[..i];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        }
        None => false,
    }
}

/// Path component of `uri`: the path of a full URL, or `uri` itself with a leading slash.
/// A full URL that does not parse is `InvalidUrl`.
pub fn request_path(uri: &str) -> crate::error::Result<String> {
    if has_scheme(uri) {
        let parts = parse_url(uri);
        if !parts.is_valid() {
            return Err(WebError::InvalidUrl(uri.to_string()));
        }
        return Ok(parts.path);
    }
    if uri.starts_with('/') {
        Ok(uri.to_string())
    } else {
        Ok(format!("/{}", uri))
    }
}
