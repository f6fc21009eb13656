use std::sync::Arc;

use http::{Method, StatusCode};
use serde::Serialize;

use super::request::{HeaderVec, Request, RequestId};
use crate::status::{status_permits_body, StatusInfo};

/// Response produced by one dispatch.
///
/// Never shared between requests. `request_id` and `method` point back at the request
/// that produced it; `close_connection` asks the transport to drop the connection after
/// sending.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderVec,
    /// Response body
    pub body: Vec<u8>,
    /// Id of the originating request
    pub request_id: RequestId,
    /// Verb of the originating request
    pub method: Method,
    /// Ask the transport to close the connection after this response
    pub close_connection: bool,
}

impl Response {
    /// Empty `200 OK` for `req`.
    #[must_use]
    pub fn new(req: &Request) -> Self {
        Self::detached(req.id, req.method.clone(), StatusCode::OK)
    }

    pub(crate) fn detached(request_id: RequestId, method: Method, status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
            request_id,
            method,
            close_connection: false,
        }
    }

    /// Plain-text response.
    #[must_use]
    pub fn text(req: &Request, status: StatusCode, body: impl Into<String>) -> Self {
        let mut res = Self::new(req);
        res.status = status;
        res.set_header("content-type", "text/plain".to_string());
        res.body = body.into().into_bytes();
        res
    }

    /// JSON response serialized from any `Serialize` value.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be serialized.
    pub fn json<T: Serialize>(
        req: &Request,
        status: StatusCode,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut res = Self::new(req);
        res.status = status;
        res.set_header("content-type", "application/json".to_string());
        res.body = serde_json::to_vec(body)?;
        Ok(res)
    }

    /// Build the substituted response for an early exit.
    ///
    /// The message becomes a `text/plain` body unless the status forbids a body.
    #[must_use]
    pub fn from_status(request_id: RequestId, method: Method, info: &StatusInfo) -> Self {
        let mut res = Self::detached(request_id, method, info.status);
        if status_permits_body(info.status) {
            res.set_header("content-type", "text/plain".to_string());
            res.body = info.body_text().as_bytes().to_vec();
        }
        for (name, value) in &info.headers {
            res.set_header(name, value.clone());
        }
        res
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        // Remove existing header with same name (case-insensitive)
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    /// Body as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
