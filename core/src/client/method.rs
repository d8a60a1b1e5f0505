/*
 * method.rs
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

//! Request methods and the body each one sends.

use std::fmt;

use crate::config::BoundaryPolicy;
use crate::content_type::ContentTypeResolver;
use crate::error::Result;
use crate::form::{urlencoded, ArgumentList, MultipartEncoder, UrlEncodedBody};
use crate::transport::RequestBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    /// Arguments as an application/x-www-form-urlencoded body.
    Post,
    /// Arguments, files included, as a multipart/form-data body.
    PostMultipartFormData,
}

impl RequestMethod {
    pub fn verb(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post | RequestMethod::PostMultipartFormData => "POST",
        }
    }

    pub(crate) fn strategy(&self) -> &'static dyn BodyStrategy {
        match self {
            RequestMethod::Get => &GetRequest,
            RequestMethod::Post => &FormUrlEncoded,
            RequestMethod::PostMultipartFormData => &MultipartFormData,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// What a body strategy may draw on.
pub(crate) struct BodyInput<'a> {
    pub arguments: &'a ArgumentList,
    pub boundary: &'a BoundaryPolicy,
    pub resolver: &'a dyn ContentTypeResolver,
    pub chunk_size: usize,
}

/// Body and Content-Type for one request.
pub(crate) struct PreparedRequest {
    pub content_type: Option<String>,
    pub body: Option<Box<dyn RequestBody>>,
}

pub(crate) trait BodyStrategy: Sync {
    fn prepare(&self, input: &BodyInput<'_>) -> Result<PreparedRequest>;
}

struct GetRequest;

impl BodyStrategy for GetRequest {
    fn prepare(&self, _input: &BodyInput<'_>) -> Result<PreparedRequest> {
        Ok(PreparedRequest {
            content_type: None,
            body: None,
        })
    }
}

struct FormUrlEncoded;

impl BodyStrategy for FormUrlEncoded {
    fn prepare(&self, input: &BodyInput<'_>) -> Result<PreparedRequest> {
        Ok(PreparedRequest {
            content_type: Some(urlencoded::CONTENT_TYPE.to_string()),
            body: Some(Box::new(UrlEncodedBody::new(input.arguments))),
        })
    }
}

struct MultipartFormData;

impl BodyStrategy for MultipartFormData {
    fn prepare(&self, input: &BodyInput<'_>) -> Result<PreparedRequest> {
        let encoder = MultipartEncoder::new(input.arguments, input.boundary.next_boundary()?, input.resolver)?
            .with_chunk_size(input.chunk_size);
        Ok(PreparedRequest {
            content_type: Some(encoder.content_type()),
            body: Some(Box::new(encoder)),
        })
    }
}
