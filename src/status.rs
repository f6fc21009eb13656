//! # Status Signal Module
//!
//! Early termination of the dispatch pipeline. Any plugin stage (pre-request fixup,
//! handling, post-response fixup) or route handler can stop processing and substitute a
//! status response by returning [`Interrupt::Finish`]. Stages do this with
//! [`finish_with`]:
//!
//! ```rust
//! use brrtdispatch::status::{finish_with, StageResult, StatusInfo};
//! use brrtdispatch::dispatcher::Request;
//!
//! fn require_admin(req: &Request) -> StageResult<()> {
//!     if req.get_header("x-admin").is_none() {
//!         return finish_with(StatusInfo::forbidden("admins only"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The signal travels back to the dispatcher by ordinary `?` propagation. The dispatcher
//! discards the rest of the chain and builds the response from the [`StatusInfo`].
//!
//! Application faults use the same channel: any `anyhow::Error` converts into
//! [`Interrupt::Fault`], which the dispatcher logs and turns into a generic 500.

use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};

use crate::dispatcher::HeaderVec;

/// Payload of the early-exit signal: status, human message and extra headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    /// Status code of the substituted response
    pub status: StatusCode,
    /// Body text; the canonical reason phrase is used when absent
    pub message: Option<String>,
    /// Headers added to the substituted response
    pub headers: HeaderVec,
}

impl StatusInfo {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            headers: HeaderVec::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Add a header, replacing any existing one with the same name (case-insensitive).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    /// 404 for a request no route (or plugin) could handle.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
            .with_message("The requested resource was not found on this server.")
    }

    /// 400 for parameter or body validation failures.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST).with_message(message)
    }

    /// 401 with a `WWW-Authenticate` challenge.
    #[must_use]
    pub fn unauthorized(challenge: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
            .with_message("Authorization required.")
            .with_header("WWW-Authenticate", challenge)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN).with_message(message)
    }

    /// 405 listing the verbs that would have matched in the `Allow` header.
    #[must_use]
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
            .with_message("The requested method is not allowed for this resource.")
            .with_header("Allow", allow)
    }

    /// 413 for bodies over the configured limit.
    #[must_use]
    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE).with_message(format!(
            "Request body exceeds the maximum allowed size of {limit} bytes."
        ))
    }

    /// Body text for the status response: the message, or the reason phrase.
    #[must_use]
    pub fn body_text(&self) -> &str {
        match &self.message {
            Some(message) => message,
            None => self.status.canonical_reason().unwrap_or(""),
        }
    }
}

/// Whether a response with this status may carry a body (RFC 9110: not 1xx, 204, 304).
#[must_use]
pub fn status_permits_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Why a stage stopped the pipeline.
#[derive(Debug)]
pub enum Interrupt {
    /// Deliberate early exit with a status response
    Finish(StatusInfo),
    /// Unhandled application fault; becomes a generic 500
    Fault(anyhow::Error),
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Finish(info) => write!(f, "finished with {}", info.status),
            Interrupt::Fault(err) => write!(f, "fault: {err}"),
        }
    }
}

impl From<StatusInfo> for Interrupt {
    fn from(info: StatusInfo) -> Self {
        Interrupt::Finish(info)
    }
}

impl From<anyhow::Error> for Interrupt {
    fn from(err: anyhow::Error) -> Self {
        Interrupt::Fault(err)
    }
}

/// Result of every plugin stage and route handler.
pub type StageResult<T> = Result<T, Interrupt>;

/// Abort the pipeline with a status response. Use as `return finish_with(...)`.
pub fn finish_with<T>(info: StatusInfo) -> StageResult<T> {
    Err(Interrupt::Finish(info))
}
